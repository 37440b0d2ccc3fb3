//! Node schedulability filtering.

use flexlb_core::Node;

/// Whether the node reports a Ready condition with status "True"
pub fn is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

/// Whether the node is administratively cordoned
pub fn is_cordoned(node: &Node) -> bool {
    node.spec
        .as_ref()
        .and_then(|s| s.unschedulable)
        .unwrap_or(false)
}

/// Keep only nodes that are ready and not cordoned, preserving list order.
///
/// List order is the tie-break order for every downstream selection.
pub fn schedulable_nodes(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .filter(|node| is_ready(node) && !is_cordoned(node))
        .collect()
}
