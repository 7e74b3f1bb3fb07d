use anyhow::Context;
use growdag::codec::{RuleRegistry, SerdeHooks};
use growdag::dag::{Dag, DagExtension, NodeId};
use growdag::rules::{Rule, RuleLogic};
use serde_json::{Value, json};

pub const ADD_WHEN_SUCCEEDED: &str = "add-when-succeeded";

/// Rule logic: once every scoped node has succeeded, add a node named `name`
/// running `task`. With `chain` set the new node depends on the scope.
#[derive(Debug, Clone)]
pub struct AddWhenSucceeded {
    pub name: String,
    pub task: String,
    pub chain: bool,
}

impl RuleLogic<String> for AddWhenSucceeded {
    fn predicate(&self, scope: &[NodeId], dag: &Dag<String>) -> anyhow::Result<bool> {
        Ok(scope.iter().all(|id| dag.is_succeeded(*id)))
    }

    fn action(&self, scope: &[NodeId], dag: &mut DagExtension<'_, String>) -> anyhow::Result<()> {
        let deps: &[NodeId] = if self.chain { scope } else { &[] };
        dag.add_node_after(self.name.clone(), self.task.clone(), deps)?;
        Ok(())
    }

    fn kind(&self) -> &str {
        ADD_WHEN_SUCCEEDED
    }

    fn params(&self) -> Value {
        json!({ "name": self.name, "task": self.task, "chain": self.chain })
    }
}

/// Rule named `rule_name` over `scope` that adds `new_node` (task = its name).
pub fn add_when_succeeded(
    rule_name: &str,
    scope: Vec<NodeId>,
    new_node: &str,
    chain: bool,
) -> Rule<String> {
    Rule::new(
        rule_name,
        scope,
        AddWhenSucceeded {
            name: new_node.to_string(),
            task: new_node.to_string(),
            chain,
        },
    )
}

/// Registry that knows [`AddWhenSucceeded`].
pub fn registry() -> RuleRegistry<String> {
    let mut registry = RuleRegistry::new();
    registry.register(ADD_WHEN_SUCCEEDED, |params: &Value| {
        let field = |key: &str| {
            params
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .with_context(|| format!("missing '{key}' in rule params"))
        };
        let logic = AddWhenSucceeded {
            name: field("name")?,
            task: field("task")?,
            chain: params.get("chain").and_then(Value::as_bool).unwrap_or(false),
        };
        Ok(Box::new(logic) as Box<dyn RuleLogic<String>>)
    });
    registry
}

/// Full-fidelity hooks for `String` tasks.
pub fn json_hooks() -> SerdeHooks<String> {
    SerdeHooks::new(registry())
}
