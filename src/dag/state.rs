// src/dag/state.rs

//! Node lifecycle states and the transitions between them.
//!
//! ```text
//! DEFINED --submit--> SUBMITTED --running--> RUNNING
//! SUBMITTED|RUNNING --success--> SUCCESS
//! SUBMITTED|RUNNING --failure--> FAILED
//! ```
//!
//! `SUCCESS` and `FAILED` are terminal. Apart from submission, every
//! transition is driven by a [`ProxyStatus`] observed by polling.

use std::fmt;
use std::str::FromStr;

use crate::errors::GrowdagError;

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Defined,
    Submitted,
    Running,
    Success,
    Failed,
}

/// Status reported by a backend for a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl NodeState {
    pub const ALL: [NodeState; 5] = [
        NodeState::Defined,
        NodeState::Submitted,
        NodeState::Running,
        NodeState::Success,
        NodeState::Failed,
    ];

    /// Symbolic name used in checkpoints.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::Defined => "DEFINED",
            NodeState::Submitted => "SUBMITTED",
            NodeState::Running => "RUNNING",
            NodeState::Success => "SUCCESS",
            NodeState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Success | NodeState::Failed)
    }

    /// Submitted to a backend but not yet terminal.
    pub fn is_in_flight(self) -> bool {
        matches!(self, NodeState::Submitted | NodeState::Running)
    }

    /// Whether the node may be submitted from this state.
    pub fn can_submit(self) -> bool {
        self == NodeState::Defined
    }

    /// State reached after observing `status` while in `self`.
    ///
    /// Returns `None` when the observation does not move the node: terminal
    /// states are sticky, `Pending` never moves a node, and a `Running`
    /// report for a node that is already running is a no-op. `DEFINED` nodes
    /// have no proxy, so no observation applies to them.
    pub fn after_status(self, status: ProxyStatus) -> Option<NodeState> {
        match (self, status) {
            (NodeState::Submitted, ProxyStatus::Running) => Some(NodeState::Running),
            (NodeState::Submitted | NodeState::Running, ProxyStatus::Success) => {
                Some(NodeState::Success)
            }
            (NodeState::Submitted | NodeState::Running, ProxyStatus::Failed) => {
                Some(NodeState::Failed)
            }
            _ => None,
        }
    }
}

impl ProxyStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProxyStatus::Success | ProxyStatus::Failed)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeState {
    type Err = GrowdagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| GrowdagError::UnknownState(s.to_string()))
    }
}
