use miette::Diagnostic;
use thiserror::Error;

/// Client error type for orchestrator API operations
#[derive(Error, Debug, Diagnostic)]
pub enum ClientError {
    /// No usable client configuration was found
    #[error("No orchestrator configuration available: {message}")]
    #[diagnostic(
        code(flexlb::client::configuration_unavailable),
        help("Run inside the cluster, or point KUBECONFIG at a valid config file")
    )]
    Configuration { message: String },

    /// Transport-level failure (connection refused, timeout, broken stream)
    #[error("Transport error: {message}")]
    #[diagnostic(
        code(flexlb::client::transport_error),
        help("Check connectivity to the orchestrator API server")
    )]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The API server answered with a non-success status
    #[error("API error (status {status}): {message}")]
    #[diagnostic(
        code(flexlb::client::api_error),
        help("The request reached the API server but was rejected")
    )]
    Api { status: u16, message: String },

    /// The target was already bound or has disappeared
    #[error("Conflict on {resource}")]
    #[diagnostic(
        code(flexlb::client::conflict),
        help("Another actor claimed this resource first; this is expected under contention")
    )]
    Conflict { resource: String },

    /// The watch's resource version is too old; re-subscribe immediately
    #[error("Watch stream expired")]
    #[diagnostic(
        code(flexlb::client::stream_expired),
        help("Re-list and re-watch; no backoff is needed")
    )]
    StreamExpired,

    /// A response body could not be decoded
    #[error("Failed to decode response: {message}")]
    #[diagnostic(
        code(flexlb::client::decode_error),
        help("The API server returned an unexpected body shape")
    )]
    Decode { message: String },
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Create a Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a Transport error without a source
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create an Api error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a Conflict error
    pub fn conflict(resource: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
        }
    }

    /// Create a Decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether this error means the watch must be re-established immediately
    pub fn is_stream_expired(&self) -> bool {
        matches!(self, Self::StreamExpired)
    }

    /// Whether this error is a bind/patch conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport {
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_predicates() {
        assert!(ClientError::StreamExpired.is_stream_expired());
        assert!(!ClientError::StreamExpired.is_conflict());
        assert!(ClientError::conflict("default/web-1").is_conflict());
        assert!(!ClientError::transport("refused").is_stream_expired());
    }
}
