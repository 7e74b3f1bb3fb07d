// src/codec/tree.rs

//! Checkpoint tree: encode a [`Workflow`] into plain JSON and back.
//!
//! ```json
//! {
//!   "dag": {
//!     "nodes": [ { "id", "name", "task",
//!                  "timestamps": { "defined", "submit", "ready by" },
//!                  "state", "proxy" } ],
//!     "edges": [ [from, to] ]
//!   },
//!   "rules": [ ... ],
//!   "applied": [ ... ]
//! }
//! ```
//!
//! Nodes and edges are written in insertion order and object keys are
//! sorted, so encoding the same workflow twice yields identical bytes.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::codec::hooks::{CheckpointHooks, Opaque};
use crate::dag::{Dag, Node, NodeId, NodeState, Timestamps};
use crate::engine::core::apply_poll_outcomes;
use crate::errors::{GrowdagError, Result};
use crate::exec::{Backend, ResultProxy, poll_outstanding};
use crate::rules::Rule;
use crate::workflow::Workflow;

/// Typed view of a checkpoint. Opaque parts stay as raw JSON, so this can be
/// read without any hooks (e.g. for inspection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointTree {
    pub dag: DagRecord,
    pub rules: Vec<Value>,
    pub applied: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagRecord {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<(NodeId, NodeId)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub name: String,
    pub task: Value,
    pub timestamps: TimestampRecord,
    pub state: String,
    pub proxy: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimestampRecord {
    pub defined: Option<DateTime<Utc>>,
    pub submit: Option<DateTime<Utc>>,
    #[serde(rename = "ready by")]
    pub ready_by: Option<DateTime<Utc>>,
}

impl From<Timestamps> for TimestampRecord {
    fn from(ts: Timestamps) -> Self {
        Self {
            defined: ts.defined,
            submit: ts.submit,
            ready_by: ts.ready_by,
        }
    }
}

impl From<TimestampRecord> for Timestamps {
    fn from(ts: TimestampRecord) -> Self {
        Self {
            defined: ts.defined,
            submit: ts.submit,
            ready_by: ts.ready_by,
        }
    }
}

impl CheckpointTree {
    /// Parse a raw checkpoint value.
    pub fn from_value(tree: &Value) -> Result<Self> {
        CheckpointTree::deserialize(tree)
            .map_err(|e| GrowdagError::MalformedCheckpoint(e.to_string()))
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Encode `workflow` into a checkpoint tree.
pub fn encode<T>(workflow: &Workflow<T>, hooks: &dyn CheckpointHooks<T>) -> Result<Value> {
    let dag = workflow.dag();

    let nodes = dag.nodes().map(|node| encode_node(node, hooks)).collect();
    let tree = CheckpointTree {
        dag: DagRecord {
            nodes,
            edges: dag.edges(),
        },
        rules: encode_rules(workflow.rules(), hooks),
        applied: encode_rules(workflow.applied_rules(), hooks),
    };

    tree.to_value()
}

fn encode_node<T>(node: &Node<T>, hooks: &dyn CheckpointHooks<T>) -> NodeRecord {
    let proxy = match node.proxy() {
        Some(proxy) => hooks.serialize_proxy(proxy).unwrap_or_else(Opaque::to_value),
        None => Value::Null,
    };

    NodeRecord {
        id: node.id(),
        name: node.name().to_string(),
        task: hooks
            .serialize_task(node.task())
            .unwrap_or_else(Opaque::to_value),
        timestamps: node.timestamps().into(),
        state: node.state().to_string(),
        proxy,
    }
}

fn encode_rules<T>(rules: &[Rule<T>], hooks: &dyn CheckpointHooks<T>) -> Vec<Value> {
    rules
        .iter()
        .map(|rule| hooks.serialize_rule(rule).unwrap_or_else(Opaque::to_value))
        .collect()
}

/// Rebuild a workflow from a checkpoint tree without polling anything.
///
/// `backend` is only handed to [`CheckpointHooks::deserialize_proxy`] so
/// proxies can be bound to a live connection.
pub fn decode_detached<T>(
    tree: &Value,
    hooks: &dyn CheckpointHooks<T>,
    backend: Option<&dyn Backend<T>>,
) -> Result<Workflow<T>> {
    let record = CheckpointTree::from_value(tree)?;

    let mut dag = Dag::new();
    for node in &record.dag.nodes {
        dag.add_node(decode_node(node, hooks, backend)?)?;
    }
    for (from, to) in record.dag.edges {
        dag.add_edge(from, to)?;
    }

    let rules = decode_rules(&record.rules, hooks, "pending rules")?;
    let applied = decode_rules(&record.applied, hooks, "applied rules")?;

    debug!(
        nodes = dag.len(),
        rules = rules.len(),
        applied = applied.len(),
        "decoded checkpoint"
    );
    Ok(Workflow::from_parts(dag, rules, applied))
}

/// Rebuild a workflow from a checkpoint tree.
///
/// With a backend, every restored node that still has an outstanding proxy
/// is polled once straight away: a node persisted as `SUBMITTED` may well
/// have finished while nothing was watching it.
pub async fn decode<T: Sync>(
    tree: &Value,
    hooks: &dyn CheckpointHooks<T>,
    backend: Option<&dyn Backend<T>>,
) -> Result<Workflow<T>> {
    let mut workflow = decode_detached(tree, hooks, backend)?;
    if backend.is_some() {
        let changed = reconcile(&mut workflow, RECONCILE_POLL_TIMEOUT).await;
        info!(changed, "reconciled restored workflow against backend");
    }
    Ok(workflow)
}

const RECONCILE_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll every outstanding proxy once and apply what comes back. A failed poll
/// leaves the node as restored and does not count towards the next run's
/// poll failure limit.
pub async fn reconcile<T: Sync>(workflow: &mut Workflow<T>, poll_timeout: Duration) -> usize {
    let (answered, unanswered): (Vec<_>, Vec<_>) = poll_outstanding(workflow.dag(), poll_timeout)
        .await
        .into_iter()
        .partition(|outcome| outcome.status.is_ok());

    for outcome in &unanswered {
        if let Err(e) = &outcome.status {
            warn!(
                node = %outcome.node,
                error = %e,
                "reconcile poll failed; keeping restored state"
            );
        }
    }
    apply_poll_outcomes(workflow.dag_mut(), answered, u32::MAX, Utc::now())
}

fn decode_node<T>(
    record: &NodeRecord,
    hooks: &dyn CheckpointHooks<T>,
    backend: Option<&dyn Backend<T>>,
) -> Result<Node<T>> {
    let state: NodeState = record.state.parse()?;

    let task = match Opaque::detect(&record.task) {
        Some(_) => {
            hooks.restore_opaque_task(&format!("node '{}' ({})", record.name, record.id))?
        }
        None => hooks.deserialize_task(&record.task)?,
    };

    let mut node = Node::with_id(record.id, record.name.clone(), task);
    node.restore(state, record.timestamps.into(), decode_proxy(record, hooks, backend)?);
    Ok(node)
}

fn decode_proxy<T>(
    record: &NodeRecord,
    hooks: &dyn CheckpointHooks<T>,
    backend: Option<&dyn Backend<T>>,
) -> Result<Option<Box<dyn ResultProxy>>> {
    if record.proxy.is_null() {
        return Ok(None);
    }
    if Opaque::detect(&record.proxy).is_some() {
        warn!(
            node = %record.id,
            name = %record.name,
            state = %record.state,
            "proxy was checkpointed as unserializable; restoring node without it"
        );
        return Ok(None);
    }
    hooks.deserialize_proxy(&record.proxy, backend)
}

fn decode_rules<T>(
    data: &[Value],
    hooks: &dyn CheckpointHooks<T>,
    context: &str,
) -> Result<Vec<Rule<T>>> {
    data.iter()
        .map(|value| match Opaque::detect(value) {
            Some(_) => hooks.restore_opaque_rule(context),
            None => hooks.deserialize_rule(value),
        })
        .collect()
}

/// Stable byte encoding of a checkpoint tree.
pub fn to_bytes(tree: &Value) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(tree)?)
}

pub fn from_bytes(bytes: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encode `workflow` and write it to `path` as pretty-printed JSON.
pub fn save<T>(
    workflow: &Workflow<T>,
    hooks: &dyn CheckpointHooks<T>,
    path: impl AsRef<Path>,
) -> Result<()> {
    let tree = encode(workflow, hooks)?;
    fs::write(path.as_ref(), serde_json::to_vec_pretty(&tree)?)?;
    info!(path = %path.as_ref().display(), "checkpoint written");
    Ok(())
}

/// Read a checkpoint tree written by [`save`].
pub fn load_tree(path: impl AsRef<Path>) -> Result<Value> {
    let contents = fs::read(path.as_ref())?;
    from_bytes(&contents)
}
