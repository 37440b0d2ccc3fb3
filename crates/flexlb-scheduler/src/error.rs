use miette::Diagnostic;
use thiserror::Error;

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// No node can take this pod right now
    #[error("No schedulable node for pod {pod_name}")]
    #[diagnostic(
        code(flexlb::scheduler::no_schedulable_node),
        help("The pod stays pending; the next watch event for it retries placement")
    )]
    NoSchedulableNode { pod_name: String, reason: String },

    /// A per-node score could not be computed
    #[error("Scoring failed for node {node_name}: {message}")]
    #[diagnostic(
        code(flexlb::scheduler::scoring_error),
        help("The node is treated as scoring 0; other candidates proceed")
    )]
    Scoring { node_name: String, message: String },

    /// Client error
    #[error("Client error: {0}")]
    #[diagnostic(
        code(flexlb::scheduler::client_error),
        help("Check connectivity to the orchestrator API server")
    )]
    Client(#[from] flexlb_client::ClientError),

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(flexlb::scheduler::internal_error),
        help("This is likely a bug. Please report it")
    )]
    Internal { message: String },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create a NoSchedulableNode error
    pub fn no_schedulable_node(pod_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NoSchedulableNode {
            pod_name: pod_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a Scoring error
    pub fn scoring(node_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Scoring {
            node_name: node_name.into(),
            message: message.into(),
        }
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
