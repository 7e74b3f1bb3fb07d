#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use growdag::dag::{Dag, Node, NodeId};
use growdag::engine::{NodeFailurePolicy, RetryPolicy, RunOptions};
use growdag::rules::Rule;
use growdag::workflow::Workflow;

use crate::hooks::add_when_succeeded;

/// Builder for `Workflow<String>` where every task is its node's name.
pub struct WorkflowBuilder {
    dag: Dag<String>,
    ids: BTreeMap<String, NodeId>,
    rules: Vec<Rule<String>>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            dag: Dag::new(),
            ids: BTreeMap::new(),
            rules: Vec::new(),
        }
    }

    pub fn node(mut self, name: &str) -> Self {
        let id = self
            .dag
            .add_node(Node::new(name, name.to_string()))
            .expect("fresh node id");
        self.ids.insert(name.to_string(), id);
        self
    }

    /// Add `name`, depending on every node in `deps`.
    pub fn node_after(mut self, name: &str, deps: &[&str]) -> Self {
        self = self.node(name);
        let to = self.id(name);
        for dep in deps {
            let from = self.id(dep);
            self.dag.add_edge(from, to).expect("valid edge");
        }
        self
    }

    /// Once every node in `scope` succeeded, add `new_node`.
    pub fn rule_when_succeeded(
        mut self,
        rule_name: &str,
        scope: &[&str],
        new_node: &str,
        chain: bool,
    ) -> Self {
        let scope = scope.iter().map(|name| self.id(name)).collect();
        self.rules
            .push(add_when_succeeded(rule_name, scope, new_node, chain));
        self
    }

    pub fn rule(mut self, rule: Rule<String>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn id(&self, name: &str) -> NodeId {
        *self
            .ids
            .get(name)
            .unwrap_or_else(|| panic!("no node named '{name}' in builder"))
    }

    pub fn build(self) -> (Workflow<String>, BTreeMap<String, NodeId>) {
        (Workflow::new(self.dag, self.rules), self.ids)
    }
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Options with millisecond pauses so scheduler tests run quickly.
pub fn fast_options() -> RunOptions {
    RunOptions {
        track: false,
        poll_interval: Duration::from_millis(1),
        poll_timeout: Duration::from_secs(1),
        max_iterations: Some(1_000),
        deadline: None,
        on_node_failed: NodeFailurePolicy::Abort,
        retry: RetryPolicy {
            submit_attempts: 3,
            submit_backoff: Duration::from_millis(1),
            max_poll_failures: 3,
        },
    }
}

/// Look up the single node called `name`.
pub fn only_node(dag: &Dag<String>, name: &str) -> NodeId {
    let ids = dag.find_by_name(name);
    assert_eq!(ids.len(), 1, "expected exactly one node named '{name}'");
    ids[0]
}
