use miette::Diagnostic;
use thiserror::Error;

/// Core error type for flexlb operations
#[derive(Error, Debug, Diagnostic)]
pub enum CoreError {
    /// A resource quantity string could not be parsed
    #[error("Invalid quantity '{value}': {reason}")]
    #[diagnostic(
        code(flexlb::invalid_quantity),
        help("Use a Kubernetes quantity like '500m', '2', '128Mi' or '1G'")
    )]
    InvalidQuantity { value: String, reason: String },

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(flexlb::internal_error),
        help("This is likely a bug. Please report it")
    )]
    InternalError { message: String },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an InvalidQuantity error
    pub fn invalid_quantity(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
