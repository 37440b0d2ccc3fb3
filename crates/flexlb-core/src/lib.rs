//! Flexlb Core - Shared resource model for the flexlb placement control plane
//!
//! This crate provides:
//! - Kubernetes quantity parsing (CPU millicores, memory bytes)
//! - Statistical helpers for balance scoring
//! - Watch wire types shared with the orchestrator
//! - Error types with miette diagnostics

pub mod error;
pub mod quantity;
pub mod stats;
pub mod watch;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use quantity::{parse_cpu, parse_memory};
pub use watch::{WatchEvent, WatchEventType};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::apps::v1::Deployment;
pub use k8s_openapi::api::core::v1::{Binding, Node, Pod};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Namespaces owned by the orchestrator's control plane. Pods and
/// deployments in these namespaces are never counted or re-routed.
pub const SYSTEM_NAMESPACES: [&str; 3] = ["kube-system", "kube-public", "kube-node-lease"];

/// Check whether a namespace belongs to the orchestrator's control plane
pub fn is_system_namespace(namespace: &str) -> bool {
    SYSTEM_NAMESPACES.contains(&namespace)
}
