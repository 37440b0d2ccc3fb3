//! Placement orchestration shared by both engines.
//!
//! A placement attempt is: list nodes, keep the schedulable ones, ask the
//! engine to pick one, create the binding. The binding is the serialisation
//! point: a conflict means another actor bound the pod first, and the pod is
//! abandoned without error.

use crate::error::{Result, SchedulerError};
use crate::filter::schedulable_nodes;
use async_trait::async_trait;
use flexlb_client::ApiClient;
use flexlb_core::{Node, Pod};
use tracing::{error, info};

/// A placement strategy: picks a target node for one pending pod
#[async_trait]
pub trait Placer: Send + Sync {
    /// The declared-scheduler name this placer claims
    fn name(&self) -> &str;

    /// Pick the best node for the pod, or None when no candidate qualifies.
    ///
    /// `nodes` has already passed the readiness/cordon filter; its order is
    /// the tie-break order.
    async fn select_node(
        &self,
        client: &ApiClient,
        pod: &Pod,
        nodes: &[Node],
    ) -> Result<Option<String>>;
}

/// Whether a pod is claimable by the named placer right now
pub fn is_claimable(pod: &Pod, scheduler_name: &str) -> bool {
    let pending = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .map(|phase| phase == "Pending")
        .unwrap_or(false);

    let unbound = pod
        .spec
        .as_ref()
        .map(|s| s.node_name.is_none())
        .unwrap_or(true);

    let claimed = pod
        .spec
        .as_ref()
        .and_then(|s| s.scheduler_name.as_deref())
        .map(|name| name == scheduler_name)
        .unwrap_or(false);

    pending && unbound && claimed
}

/// Run one placement attempt for a pending pod.
pub async fn place(placer: &dyn Placer, client: &ApiClient, pod: &Pod) -> Result<()> {
    let pod_name = pod
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| SchedulerError::internal("Pod has no name"))?;
    let namespace = pod.metadata.namespace.as_deref().unwrap_or("default");

    info!("Scheduling pod {}/{}", namespace, pod_name);

    let nodes = schedulable_nodes(client.list_nodes().await?);
    if nodes.is_empty() {
        return Err(SchedulerError::no_schedulable_node(
            pod_name,
            "no ready, uncordoned nodes",
        ));
    }
    info!("Found {} schedulable nodes", nodes.len());

    let selected = placer.select_node(client, pod, &nodes).await?;
    let node_name = match selected {
        Some(name) => name,
        None => {
            return Err(SchedulerError::no_schedulable_node(
                pod_name,
                "no candidate scored above zero",
            ))
        }
    };

    bind(client, namespace, pod_name, &node_name).await
}

/// Create the binding, abandoning the pod silently on conflict.
pub async fn bind(
    client: &ApiClient,
    namespace: &str,
    pod_name: &str,
    node_name: &str,
) -> Result<()> {
    match client.create_binding(namespace, pod_name, node_name).await {
        Ok(()) => {
            info!(
                "Successfully bound pod {}/{} to node {}",
                namespace, pod_name, node_name
            );
            Ok(())
        }
        Err(e) if e.is_conflict() => {
            info!(
                "Pod {}/{} already bound or gone, abandoning",
                namespace, pod_name
            );
            Ok(())
        }
        Err(e) => {
            error!(
                "Failed to bind pod {}/{} to node {}: {}",
                namespace, pod_name, node_name, e
            );
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{PodSpec, PodStatus};

    fn make_pod(phase: &str, node_name: Option<&str>, scheduler: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = Some("web-1".to_string());
        pod.metadata.namespace = Some("default".to_string());
        pod.spec = Some(PodSpec {
            node_name: node_name.map(str::to_string),
            scheduler_name: Some(scheduler.to_string()),
            ..Default::default()
        });
        pod.status = Some(PodStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        });
        pod
    }

    #[test]
    fn test_claimable_pending_unbound_matching() {
        let pod = make_pod("Pending", None, "greedylb-scheduler");
        assert!(is_claimable(&pod, "greedylb-scheduler"));
    }

    #[test]
    fn test_not_claimable_when_running() {
        let pod = make_pod("Running", None, "greedylb-scheduler");
        assert!(!is_claimable(&pod, "greedylb-scheduler"));
    }

    #[test]
    fn test_not_claimable_when_bound() {
        let pod = make_pod("Pending", Some("node1"), "greedylb-scheduler");
        assert!(!is_claimable(&pod, "greedylb-scheduler"));
    }

    #[test]
    fn test_not_claimable_for_other_scheduler() {
        let pod = make_pod("Pending", None, "refinelb-scheduler");
        assert!(!is_claimable(&pod, "greedylb-scheduler"));
    }

    #[test]
    fn test_not_claimable_without_status() {
        let mut pod = make_pod("Pending", None, "greedylb-scheduler");
        pod.status = None;
        assert!(!is_claimable(&pod, "greedylb-scheduler"));
    }

    /// With no API server reachable, the node list fails and the error is a
    /// client error, not a panic or a silent success.
    #[tokio::test]
    async fn test_place_without_api_server_errors() {
        struct NeverPlacer;

        #[async_trait]
        impl Placer for NeverPlacer {
            fn name(&self) -> &str {
                "never"
            }
            async fn select_node(
                &self,
                _client: &ApiClient,
                _pod: &Pod,
                _nodes: &[Node],
            ) -> Result<Option<String>> {
                Ok(None)
            }
        }

        let client = ApiClient::new("http://127.0.0.1:6443");
        let pod = make_pod("Pending", None, "never");
        let result = place(&NeverPlacer, &client, &pod).await;
        assert!(matches!(result, Err(SchedulerError::Client(_))));
    }
}
