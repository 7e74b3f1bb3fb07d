// src/workflow.rs

//! The unit of execution and persistence.

use crate::dag::{Dag, NodeState};
use crate::errors::Result;
use crate::rules::{Rule, RuleId, apply_ready_rules};

/// A DAG together with its pending and applied rules.
///
/// This triple is the complete state of a run, apart from whatever the
/// backend keeps behind the nodes' result proxies.
#[derive(Debug)]
pub struct Workflow<T> {
    dag: Dag<T>,
    rules: Vec<Rule<T>>,
    applied_rules: Vec<Rule<T>>,
}

impl<T> Default for Workflow<T> {
    fn default() -> Self {
        Self::new(Dag::new(), Vec::new())
    }
}

impl<T> Workflow<T> {
    pub fn new(dag: Dag<T>, rules: Vec<Rule<T>>) -> Self {
        Self::from_parts(dag, rules, Vec::new())
    }

    pub fn from_parts(dag: Dag<T>, rules: Vec<Rule<T>>, applied_rules: Vec<Rule<T>>) -> Self {
        Self {
            dag,
            rules,
            applied_rules,
        }
    }

    pub fn into_parts(self) -> (Dag<T>, Vec<Rule<T>>, Vec<Rule<T>>) {
        (self.dag, self.rules, self.applied_rules)
    }

    pub fn dag(&self) -> &Dag<T> {
        &self.dag
    }

    /// Mutable access for building the initial graph.
    pub fn dag_mut(&mut self) -> &mut Dag<T> {
        &mut self.dag
    }

    /// Rules that have not fired yet, in registration order.
    pub fn rules(&self) -> &[Rule<T>] {
        &self.rules
    }

    /// Rules that have fired, in the order they were applied.
    pub fn applied_rules(&self) -> &[Rule<T>] {
        &self.applied_rules
    }

    pub fn add_rule(&mut self, rule: Rule<T>) {
        self.rules.push(rule);
    }

    pub fn is_applied(&self, rule: RuleId) -> bool {
        self.applied_rules.iter().any(|r| r.id() == rule)
    }

    /// Run one rule round (see [`crate::rules::engine`]).
    pub fn apply_rules(&mut self) -> Result<Vec<RuleId>> {
        apply_ready_rules(&mut self.dag, &mut self.rules, &mut self.applied_rules)
    }

    /// No pending rules and every node terminal.
    pub fn is_finished(&self) -> bool {
        self.rules.is_empty() && self.dag.nodes().all(|n| n.state().is_terminal())
    }

    /// Count of nodes per state, in [`NodeState::ALL`] order.
    pub fn state_counts(&self) -> Vec<(NodeState, usize)> {
        NodeState::ALL
            .into_iter()
            .map(|state| {
                let count = self.dag.nodes().filter(|n| n.state() == state).count();
                (state, count)
            })
            .collect()
    }
}
