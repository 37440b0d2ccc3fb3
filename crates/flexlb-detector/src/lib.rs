//! Flexlb Detector - Adaptive workload pattern detection
//!
//! This crate provides:
//! - A bounded window of cluster pod-count samples
//! - Growth-rate computation and pattern classification
//! - The supervisory loop that re-routes deployments between placers

pub mod detector;
pub mod error;
pub mod growth;
pub mod window;

// Re-export commonly used types
pub use detector::{DetectorConfig, PatternDetector, RoutingState};
pub use error::{DetectorError, Result};
pub use growth::{classify, growth_rate, scheduler_for, Trend, WorkloadPattern};
pub use window::{GrowthSample, SampleWindow};
