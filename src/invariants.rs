use std::collections::HashSet;

use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::models::{EdgeEndpoint, GraphViolation, NodeId, ProjectEdge, ProjectNode};

/// Collects every structural problem in a candidate project graph.
///
/// Checks run in a fixed order (node ids, edge ids, edge endpoints, node
/// payloads) and never stop at the first failure. Each duplicate id is
/// reported once no matter how often it repeats.
pub fn project_graph_violations(
    nodes: &[ProjectNode],
    edges: &[ProjectEdge],
) -> Vec<GraphViolation> {
    let mut violations = Vec::new();

    let mut node_ids: HashSet<&NodeId> = HashSet::with_capacity(nodes.len());
    let mut reported_nodes = HashSet::new();
    for node in nodes {
        if !node_ids.insert(&node.id) && reported_nodes.insert(&node.id) {
            violations.push(GraphViolation::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }

    let mut edge_ids = HashSet::with_capacity(edges.len());
    let mut reported_edges = HashSet::new();
    for edge in edges {
        if !edge_ids.insert(&edge.id) && reported_edges.insert(&edge.id) {
            violations.push(GraphViolation::DuplicateEdgeId {
                edge_id: edge.id.clone(),
            });
        }
    }

    for edge in edges {
        for (endpoint, node_id) in [
            (EdgeEndpoint::Source, &edge.source),
            (EdgeEndpoint::Target, &edge.target),
        ] {
            if !node_ids.contains(node_id) {
                violations.push(GraphViolation::DanglingEdge {
                    edge_id: edge.id.clone(),
                    endpoint,
                    node_id: node_id.clone(),
                });
            }
        }
    }

    for node in nodes {
        let Some(choices) = &node.data.choices else {
            continue;
        };
        let mut choice_ids = HashSet::with_capacity(choices.len());
        let mut reported_choices = HashSet::new();
        for choice in choices {
            if !choice_ids.insert(&choice.id) && reported_choices.insert(&choice.id) {
                violations.push(GraphViolation::DuplicateChoiceId {
                    node_id: node.id.clone(),
                    choice_id: choice.id.clone(),
                });
            }
        }
    }

    violations
}

/// Rejects the graph with the full violation list attached when anything is wrong.
pub fn ensure_project_graph(nodes: &[ProjectNode], edges: &[ProjectEdge]) -> Result<()> {
    let violations = project_graph_violations(nodes, edges);
    if violations.is_empty() {
        return Ok(());
    }

    let source = anyhow!(
        "project graph validation failed with {} violation(s): {}",
        violations.len(),
        violations
            .iter()
            .map(describe)
            .collect::<Vec<_>>()
            .join("; ")
    );
    Err(LibError::invalid_graph(violations, source))
}

fn describe(violation: &GraphViolation) -> String {
    match violation {
        GraphViolation::DuplicateNodeId { node_id } => format!("duplicate node id {}", node_id),
        GraphViolation::DuplicateEdgeId { edge_id } => format!("duplicate edge id {}", edge_id),
        GraphViolation::DanglingEdge {
            edge_id,
            endpoint,
            node_id,
        } => format!("edge {} {} references missing node {}", edge_id, endpoint, node_id),
        GraphViolation::DuplicateChoiceId { node_id, choice_id } => {
            format!("node {} repeats choice id {}", node_id, choice_id)
        }
    }
}
