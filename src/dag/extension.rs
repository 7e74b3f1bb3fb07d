// src/dag/extension.rs

//! Staged mutation view handed to rule actions.
//!
//! An action never touches the live [`Dag`] directly. It reads the graph as
//! it stood before the rule round started and records additions in a
//! [`DagExtension`]. Every addition is validated immediately against the base
//! graph plus everything staged so far in the round, so an action sees
//! `DuplicateId`, `UnknownNode` and `CycleDetected` at the call that caused
//! them. Staged additions are committed only if the action succeeds; a failed
//! action leaves the graph exactly as it was.

use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::graph::{Dag, check_edge};
use crate::dag::node::{Node, NodeId};
use crate::errors::{GrowdagError, Result};

pub struct DagExtension<'a, T> {
    base: &'a Dag<T>,
    /// Base topology plus additions staged this round; used for validation
    /// only.
    topology: DiGraphMap<NodeId, ()>,
    nodes: Vec<Node<T>>,
    edges: Vec<(NodeId, NodeId)>,
}

/// Additions recorded by a successful action, ready to be committed.
pub(crate) struct StagedAdditions<T> {
    pub nodes: Vec<Node<T>>,
    pub edges: Vec<(NodeId, NodeId)>,
}

impl<'a, T> DagExtension<'a, T> {
    /// Stage on top of `base`. `topology` is the base topology plus whatever
    /// earlier actions of the same round have staged.
    pub(crate) fn stacked(base: &'a Dag<T>, topology: DiGraphMap<NodeId, ()>) -> Self {
        Self {
            base,
            topology,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// The graph as it stood before the round. Nothing staged in this round,
    /// by this action or an earlier one, is visible here.
    pub fn dag(&self) -> &'a Dag<T> {
        self.base
    }

    /// Stage a new node.
    pub fn add_node(&mut self, node: Node<T>) -> Result<NodeId> {
        let id = node.id();
        if self.topology.contains_node(id) {
            return Err(GrowdagError::DuplicateId(id));
        }
        self.topology.add_node(id);
        self.nodes.push(node);
        Ok(id)
    }

    /// Stage the dependency "`to` depends on `from`". Either endpoint may be
    /// an existing or a staged node.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        check_edge(&self.topology, from, to)?;
        if self.topology.add_edge(from, to, ()).is_none() {
            self.edges.push((from, to));
        }
        Ok(())
    }

    /// Stage a node named `name` running `task` that depends on every node in
    /// `depends_on`.
    pub fn add_node_after(
        &mut self,
        name: impl Into<String>,
        task: T,
        depends_on: &[NodeId],
    ) -> Result<NodeId> {
        if let Some(missing) = depends_on
            .iter()
            .find(|dep| !self.topology.contains_node(**dep))
        {
            return Err(GrowdagError::UnknownNode(*missing));
        }

        let id = self.add_node(Node::new(name, task))?;
        for dep in depends_on {
            self.add_edge(*dep, id)?;
        }
        Ok(id)
    }

    /// Identifiers of the nodes staged so far.
    pub fn staged_nodes(&self) -> Vec<NodeId> {
        self.nodes.iter().map(Node::id).collect()
    }

    pub fn staged_edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// The additions of this action, and the topology to stack the next
    /// action on.
    pub(crate) fn into_parts(self) -> (StagedAdditions<T>, DiGraphMap<NodeId, ()>) {
        let staged = StagedAdditions {
            nodes: self.nodes,
            edges: self.edges,
        };
        (staged, self.topology)
    }
}

impl<T> Dag<T> {
    /// Apply additions staged by a [`DagExtension`] built on this graph.
    pub(crate) fn commit(&mut self, staged: StagedAdditions<T>) -> Result<()> {
        debug!(
            nodes = staged.nodes.len(),
            edges = staged.edges.len(),
            "committing staged DAG additions"
        );
        for node in staged.nodes {
            self.add_node(node)?;
        }
        for (from, to) in staged.edges {
            self.add_edge(from, to)?;
        }
        Ok(())
    }
}
