//! Deterministic topological ordering of workflow graphs.

use loomcore::{NodeId, Workflow, WorkflowError};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

/// Order every node of the workflow so that for each connection (u -> v),
/// u appears strictly before v.
///
/// Kahn's algorithm with an explicit tie-break: when several nodes are
/// simultaneously ready, the one with the smallest node id is taken
/// first, so the same graph always sorts to the same order.
///
/// An empty node set yields an empty order. A cycle fails with
/// `CyclicGraph` naming the smallest-id node that could not be ordered.
pub fn topological_order(workflow: &Workflow) -> Result<Vec<NodeId>, WorkflowError> {
    let mut in_degree: BTreeMap<&NodeId, usize> = BTreeMap::new();
    for node in &workflow.nodes {
        if in_degree.insert(&node.id, 0).is_some() {
            return Err(WorkflowError::DuplicateNodeId(node.id.clone()));
        }
    }
    let mut successors: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();

    for conn in &workflow.connections {
        if !in_degree.contains_key(&conn.from_node) {
            return Err(WorkflowError::NodeNotFound(conn.from_node.clone()));
        }
        let degree = in_degree
            .get_mut(&conn.to_node)
            .ok_or_else(|| WorkflowError::NodeNotFound(conn.to_node.clone()))?;
        *degree += 1;
        successors
            .entry(&conn.from_node)
            .or_default()
            .push(&conn.to_node);
    }

    // Min-heap on node id for the deterministic tie-break.
    let mut ready: BinaryHeap<Reverse<&NodeId>> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| Reverse(*id))
        .collect();

    let mut order = Vec::with_capacity(workflow.nodes.len());
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id.clone());
        for succ in successors.get(id).into_iter().flatten().copied() {
            let degree = in_degree.get_mut(succ).expect("successor tracked above");
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse(succ));
            }
        }
    }

    if order.len() != workflow.nodes.len() {
        // BTreeMap iterates in id order, so this names the smallest
        // unresolved node.
        let stuck = in_degree
            .iter()
            .find(|(_, degree)| **degree > 0)
            .map(|(id, _)| (*id).clone())
            .expect("some node has unresolved dependencies");
        return Err(WorkflowError::CyclicGraph(stuck));
    }

    Ok(order)
}
