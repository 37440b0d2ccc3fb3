//! GreedyLB: single-pass resource-aware greedy placement.

use crate::error::Result;
use crate::placer::Placer;
use crate::usage::NodeUsage;
use async_trait::async_trait;
use flexlb_client::ApiClient;
use flexlb_core::{Node, Pod};
use tracing::{debug, error, info};

/// Default declared-scheduler name claimed by the greedy placer
pub const GREEDY_SCHEDULER_NAME: &str = "greedylb-scheduler";

/// Greedy score for a node: weighted free-capacity ratio.
///
/// 70% CPU weight, 30% memory weight, each ratio of available to allocatable.
pub fn greedy_score(usage: &NodeUsage) -> f64 {
    let cpu_score = (usage.cpu_available / usage.cpu_allocatable.max(1.0)) * 70.0;
    let memory_score = (usage.memory_available / usage.memory_allocatable.max(1.0)) * 30.0;

    let total = cpu_score + memory_score;
    debug!(
        "Node {}: CPU={:.2}/{:.2}m, MEM={:.2}/{:.2}GB, score={:.2}",
        usage.name,
        usage.cpu_available,
        usage.cpu_allocatable,
        usage.memory_available / 1024f64.powi(3),
        usage.memory_allocatable / 1024f64.powi(3),
        total
    );
    total
}

/// Fast greedy placement: picks the node with the most free weighted capacity
pub struct GreedyPlacer {
    scheduler_name: String,
}

impl GreedyPlacer {
    pub fn new(scheduler_name: impl Into<String>) -> Self {
        Self {
            scheduler_name: scheduler_name.into(),
        }
    }
}

impl Default for GreedyPlacer {
    fn default() -> Self {
        Self::new(GREEDY_SCHEDULER_NAME)
    }
}

#[async_trait]
impl Placer for GreedyPlacer {
    fn name(&self) -> &str {
        &self.scheduler_name
    }

    async fn select_node(
        &self,
        client: &ApiClient,
        _pod: &Pod,
        nodes: &[Node],
    ) -> Result<Option<String>> {
        let mut best_node: Option<String> = None;
        let mut best_score = 0.0;

        for node in nodes {
            let score = match NodeUsage::gather(client, node).await {
                Ok(usage) => greedy_score(&usage),
                Err(e) => {
                    let node_name = node.metadata.name.as_deref().unwrap_or("unknown");
                    error!("Error calculating score for node {}: {}", node_name, e);
                    0.0
                }
            };

            // Strict comparison keeps the first-seen node on ties
            if score > best_score {
                best_score = score;
                best_node = node.metadata.name.clone();
            }
        }

        if let Some(name) = &best_node {
            info!("Selected node {} with score {:.2}", name, best_score);
        }

        Ok(best_node)
    }
}
