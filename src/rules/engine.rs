// src/rules/engine.rs

//! Per-iteration rule application.
//!
//! One call to [`apply_ready_rules`] is one rule round:
//!
//! 1. Every pending predicate is evaluated, in registration order, against
//!    the graph as it stands before the round.
//! 2. Each rule that fired runs its action, again in registration order,
//!    against a [`DagExtension`] over that same graph. Additions staged by
//!    one action are not visible to the next; they are only checked against
//!    it for duplicate ids and cycles.
//! 3. The staged additions are committed once every action has run, and the
//!    rules move from pending to applied.
//!
//! Predicates and actions therefore all share one view of the graph per
//! round; what a round adds shows up in the next one.
//!
//! A predicate error aborts the round before any action runs. An action
//! error stops the round: the failed action commits nothing and its rule
//! stays pending, while actions that already succeeded are still committed.

use tracing::{debug, info, warn};

use crate::dag::extension::StagedAdditions;
use crate::dag::{Dag, DagExtension};
use crate::errors::{GrowdagError, Result};
use crate::rules::rule::{Rule, RuleId};

/// Run one rule round. Returns the identifiers of the rules applied, in the
/// order they were applied.
pub fn apply_ready_rules<T>(
    dag: &mut Dag<T>,
    pending: &mut Vec<Rule<T>>,
    applied: &mut Vec<Rule<T>>,
) -> Result<Vec<RuleId>> {
    let fired = evaluate_predicates(dag, pending)?;
    if fired.is_empty() {
        return Ok(Vec::new());
    }

    let (batches, failure) = run_actions(dag, pending, fired);

    let mut applied_now = Vec::with_capacity(batches.len());
    for (rule_id, staged) in batches {
        let Some(pos) = pending.iter().position(|r| r.id() == rule_id) else {
            continue;
        };

        let added_nodes = staged.nodes.len();
        let added_edges = staged.edges.len();
        dag.commit(staged)?;

        let rule = pending.remove(pos);
        info!(
            rule = %rule.id(),
            name = %rule.name(),
            added_nodes,
            added_edges,
            "rule applied"
        );
        applied_now.push(rule.id());
        applied.push(rule);
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(applied_now),
    }
}

type Batch<T> = (RuleId, StagedAdditions<T>);

/// Phase 2: run the actions of the fired rules against the pre-round graph.
/// Stops at the first failing action.
fn run_actions<T>(
    dag: &Dag<T>,
    pending: &[Rule<T>],
    fired: Vec<RuleId>,
) -> (Vec<Batch<T>>, Option<GrowdagError>) {
    let mut topology = dag.topology().clone();
    let mut batches = Vec::with_capacity(fired.len());

    for rule_id in fired {
        let Some(rule) = pending.iter().find(|r| r.id() == rule_id) else {
            continue;
        };

        let mut extension = DagExtension::stacked(dag, std::mem::take(&mut topology));
        if let Err(cause) = rule.apply(&mut extension) {
            warn!(
                rule = %rule.id(),
                name = %rule.name(),
                error = %cause,
                "rule action failed; nothing committed"
            );
            let err = GrowdagError::RuleAction {
                rule: rule.id(),
                name: rule.name().to_string(),
                cause,
            };
            return (batches, Some(err));
        }

        let (staged, grown) = extension.into_parts();
        topology = grown;
        batches.push((rule_id, staged));
    }

    (batches, None)
}

/// Phase 1: which pending rules are ready to fire against `dag`.
fn evaluate_predicates<T>(dag: &Dag<T>, pending: &[Rule<T>]) -> Result<Vec<RuleId>> {
    let mut fired = Vec::new();

    for rule in pending {
        match rule.is_ready(dag) {
            Ok(true) => {
                debug!(rule = %rule.id(), name = %rule.name(), "rule predicate satisfied");
                fired.push(rule.id());
            }
            Ok(false) => {}
            Err(cause) => {
                warn!(
                    rule = %rule.id(),
                    name = %rule.name(),
                    error = %cause,
                    "rule predicate failed"
                );
                return Err(GrowdagError::RuleEvaluation {
                    rule: rule.id(),
                    name: rule.name().to_string(),
                    cause,
                });
            }
        }
    }

    Ok(fired)
}
