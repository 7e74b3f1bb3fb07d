// src/engine/core.rs

//! Pure scheduling decisions.
//!
//! Nothing in here awaits or talks to a backend: given the current workflow
//! and what the last iteration did, these functions say which nodes may be
//! submitted, how poll results change node states and whether the run is
//! over. The async shell in [`crate::engine::runtime`] wires them together.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::dag::{Dag, NodeId, NodeState, ProxyStatus};
use crate::engine::{NodeFailurePolicy, Termination};
use crate::errors::GrowdagError;
use crate::exec::PollOutcome;
use crate::rules::RuleId;
use crate::workflow::Workflow;

/// What one iteration changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationProgress {
    pub rules_applied: usize,
    pub submitted: usize,
    pub state_changes: usize,
}

impl IterationProgress {
    pub fn has_progress(&self) -> bool {
        self.rules_applied > 0 || self.submitted > 0 || self.state_changes > 0
    }
}

/// `DEFINED` nodes whose dependencies have all succeeded, in insertion order.
pub fn ready_nodes<T>(dag: &Dag<T>) -> Vec<NodeId> {
    dag.nodes()
        .filter(|node| node.state().can_submit() && dag.is_ready(node.id()))
        .map(|node| node.id())
        .collect()
}

/// Apply poll outcomes to the graph. Returns the number of state changes.
///
/// A successful poll resets the node's failure counter. A node whose polls
/// fail `max_poll_failures` times in a row is marked `FAILED`.
pub fn apply_poll_outcomes<T>(
    dag: &mut Dag<T>,
    outcomes: Vec<PollOutcome>,
    max_poll_failures: u32,
    now: DateTime<Utc>,
) -> usize {
    let limit = max_poll_failures.max(1);
    let mut changes = 0;

    for outcome in outcomes {
        let Some(node) = dag.node_mut(outcome.node) else {
            continue;
        };

        match outcome.status {
            Ok(status) => {
                if node.observe(status, now) {
                    changes += 1;
                }
            }
            Err(source) => {
                let failures = node.record_poll_failure();
                let err = GrowdagError::BackendPoll {
                    node: outcome.node,
                    source,
                };
                warn!(name = %node.name(), failures, error = %err, "poll failed");
                if failures >= limit && node.observe(ProxyStatus::Failed, now) {
                    warn!(node = %outcome.node, "giving up on node after repeated poll failures");
                    changes += 1;
                }
            }
        }
    }

    changes
}

/// Decide whether the run ends after an iteration.
///
/// `None` means keep going. Once nothing is awaiting a poll and the last
/// iteration changed nothing, no later iteration can change anything either.
pub fn decide<T>(
    workflow: &Workflow<T>,
    progress: &IterationProgress,
    policy: NodeFailurePolicy,
) -> Option<Termination> {
    let dag = workflow.dag();
    let failed = dag.nodes_in_state(NodeState::Failed);

    if policy == NodeFailurePolicy::Abort && !failed.is_empty() {
        return Some(Termination::NodeFailed { nodes: failed });
    }

    if workflow.is_finished() {
        return Some(if failed.is_empty() {
            Termination::Completed
        } else {
            Termination::NodeFailed { nodes: failed }
        });
    }

    let awaiting = dag.nodes().any(|node| node.needs_poll());
    if awaiting || progress.has_progress() {
        return None;
    }

    if !failed.is_empty() {
        return Some(Termination::NodeFailed { nodes: failed });
    }

    let pending_rules: Vec<RuleId> = workflow.rules().iter().map(|rule| rule.id()).collect();
    let blocked_nodes: Vec<NodeId> = dag
        .nodes()
        .filter(|node| !node.state().is_terminal())
        .map(|node| node.id())
        .collect();
    debug!(
        pending_rules = pending_rules.len(),
        blocked_nodes = blocked_nodes.len(),
        "no progress possible"
    );
    Some(Termination::Stalled {
        pending_rules,
        blocked_nodes,
    })
}
