// src/inspect.rs

//! Hook-free summaries of checkpoint trees and history exports.

use std::fmt;
use std::path::Path;

use serde_json::Value;

use crate::codec::{CheckpointTree, Opaque, load_tree};
use crate::dag::{NodeId, NodeState};
use crate::errors::{GrowdagError, Result};
use crate::history::HistoryRecord;

/// What `growdag inspect` prints.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointSummary {
    /// Number of snapshots when the input was a history export.
    pub snapshots: Option<usize>,
    pub nodes: Vec<NodeLine>,
    /// Edges as `(from name, to name)`.
    pub edges: Vec<(String, String)>,
    pub pending_rules: Vec<String>,
    pub applied_rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeLine {
    pub id: String,
    pub name: String,
    pub state: String,
    pub has_proxy: bool,
}

impl CheckpointSummary {
    /// Summarise a checkpoint tree, or the last snapshot of a history export.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Array(_) => {
                let records: Vec<HistoryRecord> = serde_json::from_value(value.clone())?;
                let last = records.last().ok_or_else(|| {
                    GrowdagError::MalformedCheckpoint("history export is empty".to_string())
                })?;
                let mut summary = Self::from_tree(&CheckpointTree::from_value(&last.snapshot)?);
                summary.snapshots = Some(records.len());
                Ok(summary)
            }
            _ => Ok(Self::from_tree(&CheckpointTree::from_value(value)?)),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_value(&load_tree(path)?)
    }

    fn from_tree(tree: &CheckpointTree) -> Self {
        let name_of = |id: NodeId| {
            tree.dag
                .nodes
                .iter()
                .find(|n| n.id == id)
                .map(|n| n.name.clone())
                .unwrap_or_else(|| id.to_string())
        };

        Self {
            snapshots: None,
            nodes: tree
                .dag
                .nodes
                .iter()
                .map(|n| NodeLine {
                    id: n.id.to_string(),
                    name: n.name.clone(),
                    state: n.state.clone(),
                    has_proxy: !n.proxy.is_null() && Opaque::detect(&n.proxy).is_none(),
                })
                .collect(),
            edges: tree
                .dag
                .edges
                .iter()
                .map(|&(from, to)| (name_of(from), name_of(to)))
                .collect(),
            pending_rules: tree.rules.iter().map(rule_label).collect(),
            applied_rules: tree.applied.iter().map(rule_label).collect(),
        }
    }

    /// Number of nodes whose recorded state is `state`.
    pub fn count(&self, state: NodeState) -> usize {
        self.nodes.iter().filter(|n| n.state == state.as_str()).count()
    }
}

fn rule_label(rule: &Value) -> String {
    if let Some(kind) = Opaque::detect(rule) {
        return format!("<unserializable {kind}>");
    }
    rule.get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "<unnamed>".to_string())
}

impl fmt::Display for CheckpointSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.snapshots {
            writeln!(f, "history export: {n} snapshot(s), showing the last")?;
        }

        let counts: Vec<String> = NodeState::ALL
            .into_iter()
            .map(|state| format!("{state}={}", self.count(state)))
            .collect();
        writeln!(f, "nodes ({}): {}", self.nodes.len(), counts.join(" "))?;
        for node in &self.nodes {
            let proxy = if node.has_proxy { "" } else { " (no proxy)" };
            writeln!(f, "  - {} [{}] {}{proxy}", node.name, node.state, node.id)?;
        }

        writeln!(f, "edges ({}):", self.edges.len())?;
        for (from, to) in &self.edges {
            writeln!(f, "  {from} -> {to}")?;
        }

        writeln!(f, "pending rules ({}):", self.pending_rules.len())?;
        for rule in &self.pending_rules {
            writeln!(f, "  - {rule}")?;
        }
        writeln!(f, "applied rules ({}):", self.applied_rules.len())?;
        for rule in &self.applied_rules {
            writeln!(f, "  - {rule}")?;
        }
        Ok(())
    }
}
