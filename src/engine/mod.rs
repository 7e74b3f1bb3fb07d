// src/engine/mod.rs

//! Scheduling loop for growdag.
//!
//! One iteration of the loop:
//! 1. applies every pending rule whose predicate holds;
//! 2. submits every `DEFINED` node whose dependencies have all succeeded;
//! 3. polls outstanding proxies and advances node states;
//! 4. optionally records a snapshot in the history log;
//! 5. decides whether the run is over.
//!
//! The pure, synchronous decisions live in [`core`]; the async shell that
//! talks to the backend is implemented in [`runtime`].

use std::time::Duration;

use serde::Deserialize;

use crate::dag::NodeId;
use crate::errors::{GrowdagError, Result};
use crate::history::History;
use crate::rules::RuleId;
use crate::workflow::Workflow;

/// What to do once a node has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeFailurePolicy {
    /// Stop submitting and end the run as soon as a failure is observed.
    #[default]
    Abort,
    /// Keep running everything that does not depend on a failed node.
    #[serde(rename = "continue")]
    ContinueBestEffort,
}

/// Bounded retries for transient backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total submission attempts per node (including the first).
    pub submit_attempts: u32,
    /// Delay before the second attempt; grows linearly with each retry.
    pub submit_backoff: Duration,
    /// Consecutive failed polls after which a node is marked `FAILED`.
    pub max_poll_failures: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            submit_attempts: 3,
            submit_backoff: Duration::from_millis(100),
            max_poll_failures: 3,
        }
    }
}

/// Options for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Append a snapshot to the history log every iteration.
    pub track: bool,
    /// Pause between iterations.
    pub poll_interval: Duration,
    /// Upper bound on a single proxy poll.
    pub poll_timeout: Duration,
    pub max_iterations: Option<usize>,
    /// Wall-clock budget for the whole run.
    pub deadline: Option<Duration>,
    pub on_node_failed: NodeFailurePolicy,
    pub retry: RetryPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            track: false,
            poll_interval: Duration::from_millis(500),
            poll_timeout: Duration::from_secs(5),
            max_iterations: None,
            deadline: None,
            on_node_failed: NodeFailurePolicy::Abort,
            retry: RetryPolicy::default(),
        }
    }
}

/// Why a run ended.
#[derive(Debug)]
pub enum Termination {
    /// No pending rules and every node succeeded.
    Completed,
    /// At least one node failed.
    NodeFailed { nodes: Vec<NodeId> },
    /// Nothing in flight and nothing moved, yet work remains.
    Stalled {
        pending_rules: Vec<RuleId>,
        blocked_nodes: Vec<NodeId>,
    },
    Cancelled,
    IterationLimit(usize),
    DeadlineExceeded,
    /// A fatal engine error (rule failure, structural DAG error, ...).
    Error(GrowdagError),
}

impl Termination {
    pub fn is_completed(&self) -> bool {
        matches!(self, Termination::Completed)
    }

    pub fn is_stalled(&self) -> bool {
        matches!(self, Termination::Stalled { .. })
    }
}

/// Outcome of [`Runner::run`]. Always carries the final workflow, so a failed
/// run can still be inspected or checkpointed.
#[derive(Debug)]
pub struct RunReport<T> {
    pub workflow: Workflow<T>,
    pub termination: Termination,
    pub iterations: usize,
    /// The history log, when tracking was enabled.
    pub history: Option<History>,
}

impl<T> RunReport<T> {
    pub fn is_success(&self) -> bool {
        self.termination.is_completed()
    }

    /// The final workflow if the run completed, the typed reason otherwise.
    pub fn into_result(self) -> Result<Workflow<T>> {
        match self.termination {
            Termination::Completed => Ok(self.workflow),
            Termination::NodeFailed { nodes } => Err(GrowdagError::NodeFailed(nodes.len())),
            Termination::Stalled {
                pending_rules,
                blocked_nodes,
            } => Err(GrowdagError::Stalled {
                pending_rules: pending_rules.len(),
                blocked_nodes: blocked_nodes.len(),
            }),
            Termination::Cancelled => Err(GrowdagError::Cancelled),
            Termination::IterationLimit(n) => Err(GrowdagError::IterationLimit(n)),
            Termination::DeadlineExceeded => Err(GrowdagError::DeadlineExceeded),
            Termination::Error(e) => Err(e),
        }
    }
}

pub mod core;
pub mod runtime;

pub use self::core::{IterationProgress, apply_poll_outcomes, decide, ready_nodes};
pub use self::runtime::Runner;
