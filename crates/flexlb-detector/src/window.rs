//! Bounded window of pod-count observations.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// One observation of the cluster's active pod count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthSample {
    pub timestamp: DateTime<Utc>,
    pub active_pods: u64,
}

impl GrowthSample {
    /// Create a sample timestamped now
    pub fn now(active_pods: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            active_pods,
        }
    }
}

/// Ordered, bounded sequence of the most recent samples.
///
/// Holds at most `capacity` samples; pushing at capacity evicts the oldest.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<GrowthSample>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: GrowthSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pod counts in arrival order, oldest first
    pub fn counts(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.active_pods).collect()
    }
}
