// src/dag/node.rs

//! A task instance placed in the graph, plus its lifecycle metadata.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::dag::state::{NodeState, ProxyStatus};
use crate::errors::{GrowdagError, Result};
use crate::exec::{BackendError, BackendResult, ResultProxy};

/// Stable unique key of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The three lifecycle timestamps of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub defined: Option<DateTime<Utc>>,
    pub submit: Option<DateTime<Utc>>,
    pub ready_by: Option<DateTime<Utc>>,
}

/// One task instance in the workflow graph.
///
/// `T` is the task signature. The engine never looks inside it; it is only
/// handed to [`crate::exec::Backend::submit`].
#[derive(Debug)]
pub struct Node<T> {
    id: NodeId,
    name: String,
    task: T,
    state: NodeState,
    timestamps: Timestamps,
    proxy: Option<Box<dyn ResultProxy>>,
    /// Consecutive failed polls; reset on every successful poll.
    poll_failures: u32,
}

impl<T> Node<T> {
    /// Create a fresh `DEFINED` node with a random identifier.
    pub fn new(name: impl Into<String>, task: T) -> Self {
        Self::with_id(NodeId::new(), name, task)
    }

    pub fn with_id(id: NodeId, name: impl Into<String>, task: T) -> Self {
        Self {
            id,
            name: name.into(),
            task,
            state: NodeState::Defined,
            timestamps: Timestamps {
                defined: Some(Utc::now()),
                submit: None,
                ready_by: None,
            },
            proxy: None,
            poll_failures: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn timestamps(&self) -> Timestamps {
        self.timestamps
    }

    pub fn define_time(&self) -> Option<DateTime<Utc>> {
        self.timestamps.defined
    }

    pub fn submit_time(&self) -> Option<DateTime<Utc>> {
        self.timestamps.submit
    }

    pub fn ready_by_time(&self) -> Option<DateTime<Utc>> {
        self.timestamps.ready_by
    }

    pub fn proxy(&self) -> Option<&dyn ResultProxy> {
        self.proxy.as_deref()
    }

    /// Result of the task, read through the proxy.
    pub fn result(&self) -> BackendResult<Value> {
        match &self.proxy {
            Some(proxy) => proxy.result(),
            None => Err(BackendError::Result(format!(
                "node '{}' ({}) has no result proxy",
                self.name, self.id
            ))),
        }
    }

    /// Polling should only ever touch nodes that have a proxy and are not
    /// yet terminal.
    pub(crate) fn needs_poll(&self) -> bool {
        self.proxy.is_some() && self.state.is_in_flight()
    }

    /// `DEFINED -> SUBMITTED`.
    ///
    /// `proxy` is `None` only when the backend refused the task; the node is
    /// then failed right away by the caller.
    pub(crate) fn mark_submitted(
        &mut self,
        proxy: Option<Box<dyn ResultProxy>>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if !self.state.can_submit() {
            return Err(GrowdagError::InvalidTransition {
                node: self.id,
                from: self.state,
                to: NodeState::Submitted,
            });
        }

        self.state = NodeState::Submitted;
        self.timestamps.submit = Some(at);
        self.proxy = proxy;
        debug!(node = %self.id, name = %self.name, "node submitted");
        Ok(())
    }

    /// Apply a backend observation. Returns `true` if the state changed.
    pub(crate) fn observe(&mut self, status: ProxyStatus, at: DateTime<Utc>) -> bool {
        self.poll_failures = 0;

        let Some(next) = self.state.after_status(status) else {
            return false;
        };

        debug!(
            node = %self.id,
            name = %self.name,
            from = %self.state,
            to = %next,
            "node state changed"
        );
        self.state = next;
        if next.is_terminal() && self.timestamps.ready_by.is_none() {
            self.timestamps.ready_by = Some(at);
        }
        true
    }

    /// Count a failed poll and return the number of consecutive failures.
    pub(crate) fn record_poll_failure(&mut self) -> u32 {
        self.poll_failures += 1;
        self.poll_failures
    }

    /// Overwrite state and timestamps from a checkpoint.
    ///
    /// Bypasses the transition rules on purpose: the persisted value wins
    /// until a backend is polled again.
    pub(crate) fn restore(
        &mut self,
        state: NodeState,
        timestamps: Timestamps,
        proxy: Option<Box<dyn ResultProxy>>,
    ) {
        self.state = state;
        self.timestamps = timestamps;
        self.proxy = proxy;
        self.poll_failures = 0;
    }
}
