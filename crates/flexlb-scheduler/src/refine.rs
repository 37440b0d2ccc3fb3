//! RefineLB: multi-factor placement optimising cluster-wide balance.

use crate::error::Result;
use crate::placer::Placer;
use crate::usage::{NodeUsage, PodRequest};
use async_trait::async_trait;
use flexlb_client::ApiClient;
use flexlb_core::stats::std_dev;
use flexlb_core::{Node, Pod};
use tracing::{debug, error, info, warn};

/// Default declared-scheduler name claimed by the refined placer
pub const REFINE_SCHEDULER_NAME: &str = "refinelb-scheduler";

/// Per-node pod cap used by the density term
const MAX_PODS_PER_NODE: f64 = 110.0;

/// Utilisation sweet spot targeted by the fourth term (percent)
const TARGET_UTILIZATION: f64 = 65.0;

/// Composite score for placing `request` on the node described by `usage`.
///
/// Four weighted terms (40/30/20/10): resources after placement, cluster
/// balance, pod-density spreading, and distance from the target utilisation.
/// The balance and target terms are deliberately unclamped: a node far from
/// the cluster average can drag the total negative. Infeasible nodes (not
/// enough CPU or memory left for the request) score 0.
pub fn refined_score(usage: &NodeUsage, request: &PodRequest, all_usages: &[NodeUsage]) -> f64 {
    if all_usages.is_empty() {
        return 0.0;
    }

    // Feasibility gate
    if usage.cpu_available < request.cpu_millicores
        || usage.memory_available < request.memory_bytes
    {
        return 0.0;
    }

    // Factor 1: resources remaining after placement (40%)
    let cpu_after = usage.cpu_available - request.cpu_millicores;
    let memory_after = usage.memory_available - request.memory_bytes;
    let cpu_ratio = cpu_after / usage.cpu_allocatable.max(1.0);
    let memory_ratio = memory_after / usage.memory_allocatable.max(1.0);
    let resources_score = (cpu_ratio * 0.5 + memory_ratio * 0.5) * 40.0;

    // Utilisation this node would reach with the pod placed
    let new_cpu_util =
        ((usage.cpu_used + request.cpu_millicores) / usage.cpu_allocatable.max(1.0)) * 100.0;
    let new_mem_util =
        ((usage.memory_used + request.memory_bytes) / usage.memory_allocatable.max(1.0)) * 100.0;

    // Factor 2: distance from the cluster mean (30%)
    let count = all_usages.len() as f64;
    let avg_cpu_util = all_usages.iter().map(|u| u.cpu_utilization).sum::<f64>() / count;
    let avg_mem_util = all_usages.iter().map(|u| u.memory_utilization).sum::<f64>() / count;

    let cpu_balance = 100.0 - (new_cpu_util - avg_cpu_util).abs();
    let mem_balance = 100.0 - (new_mem_util - avg_mem_util).abs();
    let balance_score = (cpu_balance * 0.5 + mem_balance * 0.5) * 0.3;

    // Factor 3: pod-density spreading (20%)
    let density_score = (1.0 - usage.pod_count as f64 / MAX_PODS_PER_NODE) * 20.0;

    // Factor 4: target utilisation (10%)
    let cpu_target = 100.0 - (new_cpu_util - TARGET_UTILIZATION).abs();
    let mem_target = 100.0 - (new_mem_util - TARGET_UTILIZATION).abs();
    let target_score = (cpu_target * 0.5 + mem_target * 0.5) * 0.1;

    let total = resources_score + balance_score + density_score + target_score;

    debug!(
        "Node {}: total={:.2} [res={:.2}, bal={:.2}, den={:.2}, tgt={:.2}] \
         CPU={:.1}%->{:.1}% MEM={:.1}%->{:.1}% pods={}",
        usage.name,
        total,
        resources_score,
        balance_score,
        density_score,
        target_score,
        usage.cpu_utilization,
        new_cpu_util,
        usage.memory_utilization,
        new_mem_util,
        usage.pod_count
    );

    total
}

/// Mean of the CPU and memory utilisation standard deviations across the
/// candidate set. Lower means a more evenly loaded cluster.
pub fn cluster_imbalance(usages: &[NodeUsage]) -> f64 {
    let cpu_utils: Vec<f64> = usages.iter().map(|u| u.cpu_utilization).collect();
    let mem_utils: Vec<f64> = usages.iter().map(|u| u.memory_utilization).collect();
    (std_dev(&cpu_utils) + std_dev(&mem_utils)) / 2.0
}

/// Refined placement: multi-factor scoring with spreading and balance terms
pub struct RefinePlacer {
    scheduler_name: String,
}

impl RefinePlacer {
    pub fn new(scheduler_name: impl Into<String>) -> Self {
        Self {
            scheduler_name: scheduler_name.into(),
        }
    }
}

impl Default for RefinePlacer {
    fn default() -> Self {
        Self::new(REFINE_SCHEDULER_NAME)
    }
}

#[async_trait]
impl Placer for RefinePlacer {
    fn name(&self) -> &str {
        &self.scheduler_name
    }

    async fn select_node(
        &self,
        client: &ApiClient,
        pod: &Pod,
        nodes: &[Node],
    ) -> Result<Option<String>> {
        let request = PodRequest::from_pod(pod);

        // Snapshot every candidate; a node whose usage cannot be read is
        // dropped from both the candidate set and the balance averages.
        let mut usages = Vec::with_capacity(nodes.len());
        for node in nodes {
            match NodeUsage::gather(client, node).await {
                Ok(usage) => usages.push(usage),
                Err(e) => {
                    let node_name = node.metadata.name.as_deref().unwrap_or("unknown");
                    error!("Error getting resource usage for node {}: {}", node_name, e);
                }
            }
        }

        if usages.is_empty() {
            return Ok(None);
        }

        let mut scored: Vec<(&NodeUsage, f64)> = usages
            .iter()
            .map(|usage| (usage, refined_score(usage, &request, &usages)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        if scored.is_empty() {
            warn!("No suitable nodes found for pod");
            return Ok(None);
        }

        // Stable sort: first-seen order breaks ties
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (best, best_score) = scored[0];
        info!(
            "Selected node {} with refined score {:.2}",
            best.name, best_score
        );
        debug!("Cluster imbalance: {:.2}", cluster_imbalance(&usages));

        Ok(Some(best.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_usage(
        name: &str,
        cpu_alloc: f64,
        cpu_used: f64,
        mem_alloc: f64,
        mem_used: f64,
        pod_count: usize,
    ) -> NodeUsage {
        NodeUsage {
            name: name.to_string(),
            cpu_allocatable: cpu_alloc,
            memory_allocatable: mem_alloc,
            cpu_used,
            memory_used: mem_used,
            cpu_available: cpu_alloc - cpu_used,
            memory_available: mem_alloc - mem_used,
            pod_count,
            cpu_utilization: (cpu_used / cpu_alloc.max(1.0)) * 100.0,
            memory_utilization: (mem_used / mem_alloc.max(1.0)) * 100.0,
        }
    }

    fn request(cpu: f64, memory: f64) -> PodRequest {
        PodRequest {
            cpu_millicores: cpu,
            memory_bytes: memory,
        }
    }

    /// A node without room for the request is infeasible and scores 0.
    #[test]
    fn test_feasibility_gate() {
        let tight = make_usage("tight", 2000.0, 1950.0, 8.0e9, 0.0, 1);
        let roomy = make_usage("roomy", 2000.0, 1500.0, 8.0e9, 0.0, 1);
        let usages = vec![tight.clone(), roomy.clone()];
        let req = request(100.0, 128.0 * 1024.0 * 1024.0);

        assert_eq!(refined_score(&tight, &req, &usages), 0.0);
        assert!(refined_score(&roomy, &req, &usages) > 0.0);
    }

    /// Memory shortage alone is also infeasible.
    #[test]
    fn test_feasibility_gate_memory() {
        let usage = make_usage("node", 4000.0, 0.0, 1.0e9, 0.95e9, 1);
        let usages = vec![usage.clone()];
        assert_eq!(
            refined_score(&usage, &request(100.0, 128.0 * 1024.0 * 1024.0), &usages),
            0.0
        );
    }

    /// With identical allocatable, the emptiest node scores highest.
    #[test]
    fn test_emptiest_node_wins() {
        let a = make_usage("a", 2000.0, 0.0, 4.0e9, 0.0, 0);
        let b = make_usage("b", 2000.0, 500.0, 4.0e9, 1.0e9, 2);
        let c = make_usage("c", 2000.0, 1000.0, 4.0e9, 2.0e9, 4);
        let usages = vec![a.clone(), b.clone(), c.clone()];
        let req = request(100.0, 128.0 * 1024.0 * 1024.0);

        let score_a = refined_score(&a, &req, &usages);
        let score_b = refined_score(&b, &req, &usages);
        let score_c = refined_score(&c, &req, &usages);

        assert!(score_a > score_b);
        assert!(score_b > score_c);
    }

    /// The balance term is unclamped: when the candidate sits more than 100
    /// utilisation points from the cluster average, its per-axis balance
    /// score goes negative and the contribution carries that sign.
    #[test]
    fn test_balance_term_can_go_negative() {
        // Overcommitted peers at 250% CPU utilisation drag the average to
        // 225%; the empty candidate lands ~225 points below it.
        let cold = make_usage("cold", 100_000.0, 0.0, 1.0e12, 0.0, 0);
        let peers: Vec<NodeUsage> = (0..9)
            .map(|i| make_usage(&format!("p{}", i), 1000.0, 2500.0, 1.0e12, 0.0, 0))
            .collect();

        let mut usages = vec![cold.clone()];
        usages.extend(peers);

        let req = request(100.0, 128.0 * 1024.0 * 1024.0);

        let count = usages.len() as f64;
        let avg_cpu = usages.iter().map(|u| u.cpu_utilization).sum::<f64>() / count;
        let new_cpu_util = (cold.cpu_used + req.cpu_millicores) / cold.cpu_allocatable * 100.0;
        let cpu_balance = 100.0 - (new_cpu_util - avg_cpu).abs();
        assert!(cpu_balance < 0.0, "cpu balance sub-score must be negative");

        // The total must reflect the negative contribution rather than a
        // clamped-at-zero variant.
        let actual = refined_score(&cold, &req, &usages);
        let avg_mem = usages.iter().map(|u| u.memory_utilization).sum::<f64>() / count;
        let new_mem_util =
            (cold.memory_used + req.memory_bytes) / cold.memory_allocatable * 100.0;
        let mem_balance = 100.0 - (new_mem_util - avg_mem).abs();
        let balance_contribution = (cpu_balance * 0.5 + mem_balance * 0.5) * 0.3;

        let cpu_after = (cold.cpu_available - req.cpu_millicores) / cold.cpu_allocatable;
        let mem_after = (cold.memory_available - req.memory_bytes) / cold.memory_allocatable;
        let resources = (cpu_after * 0.5 + mem_after * 0.5) * 40.0;
        let density = 20.0;
        let target = ((100.0 - (new_cpu_util - 65.0).abs()) * 0.5
            + (100.0 - (new_mem_util - 65.0).abs()) * 0.5)
            * 0.1;

        let expected = resources + balance_contribution + density + target;
        assert!((actual - expected).abs() < 1e-9);
    }

    /// Density term goes negative beyond the 110-pod cap.
    #[test]
    fn test_density_negative_above_cap() {
        let crowded = make_usage("crowded", 100_000.0, 0.0, 1.0e12, 0.0, 120);
        let empty = make_usage("empty", 100_000.0, 0.0, 1.0e12, 0.0, 0);
        let usages = vec![crowded.clone(), empty.clone()];
        let req = request(100.0, 128.0 * 1024.0 * 1024.0);

        let crowded_score = refined_score(&crowded, &req, &usages);
        let empty_score = refined_score(&empty, &req, &usages);

        // (1 - 120/110)*20 ≈ -1.82 vs (1 - 0)*20 = 20
        assert!((empty_score - crowded_score) > 20.0);
    }

    /// Exact composition check against the four-term formula.
    #[test]
    fn test_score_composition() {
        // Single candidate: averages equal its own utilisation.
        let usage = make_usage("solo", 1000.0, 500.0, 1.0e9, 0.5e9, 10);
        let usages = vec![usage.clone()];
        let req = request(100.0, 0.1e9);

        let cpu_after = (400.0) / 1000.0;
        let mem_after = (0.4e9) / 1.0e9;
        let resources = (cpu_after * 0.5 + mem_after * 0.5) * 40.0;

        let new_cpu_util: f64 = 600.0 / 1000.0 * 100.0;
        let new_mem_util: f64 = 0.6e9 / 1.0e9 * 100.0;
        let balance = ((100.0 - (new_cpu_util - 50.0).abs()) * 0.5
            + (100.0 - (new_mem_util - 50.0).abs()) * 0.5)
            * 0.3;
        let density = (1.0 - 10.0 / 110.0) * 20.0;
        let target = ((100.0 - (new_cpu_util - 65.0).abs()) * 0.5
            + (100.0 - (new_mem_util - 65.0).abs()) * 0.5)
            * 0.1;

        let expected = resources + balance + density + target;
        let actual = refined_score(&usage, &req, &usages);
        assert!((actual - expected).abs() < 1e-9);
    }

    #[test]
    fn test_cluster_imbalance() {
        let even = vec![
            make_usage("a", 1000.0, 500.0, 1.0e9, 0.5e9, 0),
            make_usage("b", 1000.0, 500.0, 1.0e9, 0.5e9, 0),
        ];
        assert_eq!(cluster_imbalance(&even), 0.0);

        let skewed = vec![
            make_usage("a", 1000.0, 0.0, 1.0e9, 0.0, 0),
            make_usage("b", 1000.0, 1000.0, 1.0e9, 1.0e9, 0),
        ];
        assert!(cluster_imbalance(&skewed) > 0.0);
    }

    #[test]
    fn test_default_scheduler_name() {
        assert_eq!(RefinePlacer::default().name(), "refinelb-scheduler");
    }
}
