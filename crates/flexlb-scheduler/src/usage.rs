//! Node usage aggregation and pod resource requests.
//!
//! `NodeUsage` is a pure function of a (node, pods-on-node) snapshot; it is
//! recomputed per scheduling decision and never persisted.

use crate::error::Result;
use flexlb_client::ApiClient;
use flexlb_core::{parse_cpu, parse_memory, Node, Pod};

/// Default CPU request for pods that declare none (millicores)
pub const DEFAULT_CPU_REQUEST: f64 = 100.0;
/// Default memory request for pods that declare none (bytes)
pub const DEFAULT_MEMORY_REQUEST: f64 = 128.0 * 1024.0 * 1024.0;

/// Resource usage snapshot for one node
#[derive(Debug, Clone)]
pub struct NodeUsage {
    pub name: String,
    /// Allocatable CPU in millicores
    pub cpu_allocatable: f64,
    /// Allocatable memory in bytes
    pub memory_allocatable: f64,
    /// Sum of CPU requests of non-terminal pods on the node
    pub cpu_used: f64,
    /// Sum of memory requests of non-terminal pods on the node
    pub memory_used: f64,
    pub cpu_available: f64,
    pub memory_available: f64,
    /// Count of non-terminal pods on the node
    pub pod_count: usize,
    /// CPU utilisation percentage
    pub cpu_utilization: f64,
    /// Memory utilisation percentage
    pub memory_utilization: f64,
}

impl NodeUsage {
    /// Aggregate a usage snapshot from a node and the non-terminal pods
    /// currently assigned to it.
    pub fn from_parts(node: &Node, pods: &[Pod]) -> Self {
        let name = node
            .metadata
            .name
            .clone()
            .unwrap_or_else(|| "unknown".to_string());

        let allocatable = node
            .status
            .as_ref()
            .and_then(|s| s.allocatable.as_ref());

        let cpu_allocatable = allocatable
            .and_then(|a| a.get("cpu"))
            .and_then(|q| parse_cpu(&q.0).ok())
            .unwrap_or(0.0);
        let memory_allocatable = allocatable
            .and_then(|a| a.get("memory"))
            .and_then(|q| parse_memory(&q.0).ok())
            .unwrap_or(0.0);

        let mut cpu_used = 0.0;
        let mut memory_used = 0.0;

        for pod in pods {
            let (cpu, memory) = declared_requests(pod);
            cpu_used += cpu;
            memory_used += memory;
        }

        Self {
            name,
            cpu_allocatable,
            memory_allocatable,
            cpu_used,
            memory_used,
            cpu_available: cpu_allocatable - cpu_used,
            memory_available: memory_allocatable - memory_used,
            pod_count: pods.len(),
            cpu_utilization: (cpu_used / cpu_allocatable.max(1.0)) * 100.0,
            memory_utilization: (memory_used / memory_allocatable.max(1.0)) * 100.0,
        }
    }

    /// Gather the live usage snapshot for a node.
    ///
    /// Lists the node's non-terminal pods through the API server and folds
    /// them into [`NodeUsage::from_parts`].
    pub async fn gather(client: &ApiClient, node: &Node) -> Result<Self> {
        let node_name = node.metadata.name.as_deref().unwrap_or("unknown");
        let selector = format!(
            "spec.nodeName={},status.phase!=Failed,status.phase!=Succeeded",
            node_name
        );
        let pods = client.list_pods(Some(&selector)).await?;
        Ok(Self::from_parts(node, &pods))
    }
}

/// Sum of declared container requests, without defaulting
fn declared_requests(pod: &Pod) -> (f64, f64) {
    let mut cpu = 0.0;
    let mut memory = 0.0;

    let containers = match &pod.spec {
        Some(spec) => &spec.containers,
        None => return (0.0, 0.0),
    };

    for container in containers {
        if let Some(requests) = container.resources.as_ref().and_then(|r| r.requests.as_ref()) {
            cpu += requests
                .get("cpu")
                .and_then(|q| parse_cpu(&q.0).ok())
                .unwrap_or(0.0);
            memory += requests
                .get("memory")
                .and_then(|q| parse_memory(&q.0).ok())
                .unwrap_or(0.0);
        }
    }

    (cpu, memory)
}

/// Total resources a pod asks for, with the refined placer's defaulting rules
#[derive(Debug, Clone, PartialEq)]
pub struct PodRequest {
    /// CPU in millicores
    pub cpu_millicores: f64,
    /// Memory in bytes
    pub memory_bytes: f64,
}

impl PodRequest {
    /// Extract the pod's total resource request.
    ///
    /// Inside a declared requests map, a missing `cpu` key counts as 100m and
    /// a missing `memory` key as 128Mi. A zero total after parsing falls back
    /// to the same defaults.
    pub fn from_pod(pod: &Pod) -> Self {
        let mut cpu = 0.0;
        let mut memory = 0.0;

        if let Some(spec) = &pod.spec {
            for container in &spec.containers {
                if let Some(requests) =
                    container.resources.as_ref().and_then(|r| r.requests.as_ref())
                {
                    cpu += requests
                        .get("cpu")
                        .map(|q| parse_cpu(&q.0).unwrap_or(0.0))
                        .unwrap_or(DEFAULT_CPU_REQUEST);
                    memory += requests
                        .get("memory")
                        .map(|q| parse_memory(&q.0).unwrap_or(0.0))
                        .unwrap_or(DEFAULT_MEMORY_REQUEST);
                }
            }
        }

        if cpu == 0.0 {
            cpu = DEFAULT_CPU_REQUEST;
        }
        if memory == 0.0 {
            memory = DEFAULT_MEMORY_REQUEST;
        }

        Self {
            cpu_millicores: cpu,
            memory_bytes: memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, NodeStatus, PodSpec, ResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::collections::BTreeMap;

    fn make_node(name: &str, cpu: &str, memory: &str) -> Node {
        let mut allocatable = BTreeMap::new();
        allocatable.insert("cpu".to_string(), Quantity(cpu.to_string()));
        allocatable.insert("memory".to_string(), Quantity(memory.to_string()));

        let mut node = Node::default();
        node.metadata.name = Some(name.to_string());
        node.status = Some(NodeStatus {
            allocatable: Some(allocatable),
            ..Default::default()
        });
        node
    }

    fn make_pod(cpu: Option<&str>, memory: Option<&str>) -> Pod {
        let mut requests = BTreeMap::new();
        if let Some(cpu) = cpu {
            requests.insert("cpu".to_string(), Quantity(cpu.to_string()));
        }
        if let Some(memory) = memory {
            requests.insert("memory".to_string(), Quantity(memory.to_string()));
        }

        let mut pod = Pod::default();
        pod.spec = Some(PodSpec {
            containers: vec![Container {
                name: "main".to_string(),
                resources: Some(ResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        });
        pod
    }

    fn make_bare_pod() -> Pod {
        let mut pod = Pod::default();
        pod.spec = Some(PodSpec {
            containers: vec![Container {
                name: "main".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        pod
    }

    #[test]
    fn test_from_parts_empty_node() {
        let node = make_node("node1", "4", "8Gi");
        let usage = NodeUsage::from_parts(&node, &[]);

        assert_eq!(usage.name, "node1");
        assert_eq!(usage.cpu_allocatable, 4000.0);
        assert_eq!(usage.memory_allocatable, 8.0 * 1024f64.powi(3));
        assert_eq!(usage.cpu_used, 0.0);
        assert_eq!(usage.cpu_available, 4000.0);
        assert_eq!(usage.pod_count, 0);
        assert_eq!(usage.cpu_utilization, 0.0);
    }

    #[test]
    fn test_from_parts_sums_pod_requests() {
        let node = make_node("node1", "2", "4Gi");
        let pods = vec![
            make_pod(Some("500m"), Some("1Gi")),
            make_pod(Some("250m"), Some("512Mi")),
        ];
        let usage = NodeUsage::from_parts(&node, &pods);

        assert_eq!(usage.cpu_used, 750.0);
        assert_eq!(usage.memory_used, 1.5 * 1024f64.powi(3));
        assert_eq!(usage.cpu_available, 1250.0);
        assert_eq!(usage.pod_count, 2);
        assert!((usage.cpu_utilization - 37.5).abs() < 1e-9);
    }

    #[test]
    fn test_from_parts_pods_without_requests_count_toward_density_only() {
        let node = make_node("node1", "2", "4Gi");
        let pods = vec![make_bare_pod(), make_bare_pod()];
        let usage = NodeUsage::from_parts(&node, &pods);

        assert_eq!(usage.cpu_used, 0.0);
        assert_eq!(usage.pod_count, 2);
    }

    #[test]
    fn test_pod_request_explicit() {
        let pod = make_pod(Some("200m"), Some("256Mi"));
        let request = PodRequest::from_pod(&pod);
        assert_eq!(request.cpu_millicores, 200.0);
        assert_eq!(request.memory_bytes, 256.0 * 1024.0 * 1024.0);
    }

    #[test]
    fn test_pod_request_defaults_for_bare_pod() {
        let request = PodRequest::from_pod(&make_bare_pod());
        assert_eq!(request.cpu_millicores, DEFAULT_CPU_REQUEST);
        assert_eq!(request.memory_bytes, DEFAULT_MEMORY_REQUEST);
    }

    /// A requests map that declares memory but not cpu takes the per-container
    /// cpu default.
    #[test]
    fn test_pod_request_partial_map_defaults() {
        let pod = make_pod(None, Some("512Mi"));
        let request = PodRequest::from_pod(&pod);
        assert_eq!(request.cpu_millicores, DEFAULT_CPU_REQUEST);
        assert_eq!(request.memory_bytes, 512.0 * 1024.0 * 1024.0);
    }

    #[test]
    fn test_pod_request_multiple_containers() {
        let mut pod = make_pod(Some("100m"), Some("128Mi"));
        let extra = make_pod(Some("300m"), Some("256Mi"));
        pod.spec
            .as_mut()
            .unwrap()
            .containers
            .extend(extra.spec.unwrap().containers);

        let request = PodRequest::from_pod(&pod);
        assert_eq!(request.cpu_millicores, 400.0);
        assert_eq!(request.memory_bytes, 384.0 * 1024.0 * 1024.0);
    }
}
