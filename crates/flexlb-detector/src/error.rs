use miette::Diagnostic;
use thiserror::Error;

/// Detector error type
#[derive(Error, Debug, Diagnostic)]
pub enum DetectorError {
    /// Client error
    #[error("Client error: {0}")]
    #[diagnostic(
        code(flexlb::detector::client_error),
        help("Check connectivity to the orchestrator API server")
    )]
    Client(#[from] flexlb_client::ClientError),

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(flexlb::detector::internal_error),
        help("This is likely a bug. Please report it")
    )]
    Internal { message: String },
}

/// Result type for detector operations
pub type Result<T> = std::result::Result<T, DetectorError>;

impl DetectorError {
    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
