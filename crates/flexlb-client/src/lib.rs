//! Flexlb Client - Orchestrator API access for the flexlb control plane
//!
//! This crate provides:
//! - Client configuration discovery (in-cluster, local config file)
//! - Typed REST operations (nodes, pods, deployments, bindings)
//! - Watch streams with stream-expiry detection

pub mod client;
pub mod config;
pub mod error;
pub mod watch;

// Re-export commonly used types
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use watch::PodWatchStream;
