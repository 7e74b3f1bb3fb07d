// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use serde_json::Value;
use tracing::debug;

use crate::dag::node::{Node, NodeId};
use crate::dag::state::NodeState;
use crate::errors::{GrowdagError, Result};
use crate::exec::BackendError;

/// Mutable node/edge container.
///
/// Topology lives in a petgraph `DiGraphMap` keyed by [`NodeId`]; node
/// payloads live next to it. An edge `(from, to)` means "`to` depends on
/// `from`". The graph is acyclic at all times: every edge is checked at
/// insertion, since rules may add arbitrary edges while a run is in progress.
///
/// Nodes and edges are never removed, so iteration order is insertion order.
#[derive(Debug)]
pub struct Dag<T> {
    topology: DiGraphMap<NodeId, ()>,
    nodes: HashMap<NodeId, Node<T>>,
}

impl<T> Default for Dag<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Dag<T> {
    pub fn new() -> Self {
        Self {
            topology: DiGraphMap::new(),
            nodes: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Insert a node. Fails with `DuplicateId` if the identifier is taken.
    pub fn add_node(&mut self, node: Node<T>) -> Result<NodeId> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(GrowdagError::DuplicateId(id));
        }

        debug!(node = %id, name = %node.name(), "adding node to DAG");
        self.topology.add_node(id);
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Add the dependency "`to` depends on `from`".
    ///
    /// Fails with `UnknownNode` if either endpoint is missing and with
    /// `CycleDetected` if `from` is already reachable from `to`. On error the
    /// graph is left untouched.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        check_edge(&self.topology, from, to)?;
        self.topology.add_edge(from, to, ());
        debug!(%from, %to, "adding edge to DAG");
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(&id)
    }

    /// Like [`Dag::node`], with a missing node reported as `UnknownNode`.
    pub fn node_or_err(&self, id: NodeId) -> Result<&Node<T>> {
        self.nodes.get(&id).ok_or(GrowdagError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<T>> {
        self.nodes.get_mut(&id)
    }

    /// Node identifiers in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.topology.nodes()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node<T>> + '_ {
        self.topology.nodes().filter_map(|id| self.nodes.get(&id))
    }

    /// Edges `(from, to)` in insertion order.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.topology.all_edges().map(|(a, b, _)| (a, b)).collect()
    }

    /// Direct dependencies of `id`.
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct dependents of `id`.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: NodeId, dir: Direction) -> Vec<NodeId> {
        if !self.topology.contains_node(id) {
            return Vec::new();
        }
        self.topology.neighbors_directed(id, dir).collect()
    }

    /// True iff every predecessor of `id` is `SUCCESS`. A node without
    /// predecessors is ready immediately; an unknown node is never ready.
    pub fn is_ready(&self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.topology
            .neighbors_directed(id, Direction::Incoming)
            .all(|dep| self.is_succeeded(dep))
    }

    pub fn is_succeeded(&self, id: NodeId) -> bool {
        self.state_of(id) == Some(NodeState::Success)
    }

    pub fn state_of(&self, id: NodeId) -> Option<NodeState> {
        self.nodes.get(&id).map(Node::state)
    }

    /// Identifiers of all nodes carrying `name`, in insertion order.
    pub fn find_by_name(&self, name: &str) -> Vec<NodeId> {
        self.nodes()
            .filter(|n| n.name() == name)
            .map(Node::id)
            .collect()
    }

    /// Identifiers of all nodes currently in `state`, in insertion order.
    pub fn nodes_in_state(&self, state: NodeState) -> Vec<NodeId> {
        self.nodes()
            .filter(|n| n.state() == state)
            .map(Node::id)
            .collect()
    }

    /// Whether any upstream node (transitively) has failed.
    pub fn has_failed_ancestor(&self, id: NodeId) -> bool {
        self.nodes_in_state(NodeState::Failed)
            .into_iter()
            .any(|failed| failed != id && has_path_connecting(&self.topology, failed, id, None))
    }

    /// Result of a node that has succeeded.
    pub fn result_of(&self, id: NodeId) -> Result<Value> {
        let node = self.node_or_err(id)?;
        let outcome = if node.state() == NodeState::Success {
            node.result()
        } else {
            Err(BackendError::Result(format!(
                "node '{}' is {}, not SUCCESS",
                node.name(),
                node.state()
            )))
        };
        outcome.map_err(|source| GrowdagError::ResultUnavailable { node: id, source })
    }

    pub(crate) fn topology(&self) -> &DiGraphMap<NodeId, ()> {
        &self.topology
    }
}

/// Validate a prospective edge against `topology` without inserting it.
pub(crate) fn check_edge(
    topology: &DiGraphMap<NodeId, ()>,
    from: NodeId,
    to: NodeId,
) -> Result<()> {
    for endpoint in [from, to] {
        if !topology.contains_node(endpoint) {
            return Err(GrowdagError::UnknownNode(endpoint));
        }
    }
    if from == to || has_path_connecting(topology, to, from, None) {
        return Err(GrowdagError::CycleDetected { from, to });
    }
    Ok(())
}
