// src/rules/rule.rs

//! A conditional DAG mutation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dag::{Dag, DagExtension, NodeId};

/// Stable identity of a rule; used in errors, logs and checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(Uuid);

impl RuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RuleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The predicate/action capability a rule carries.
///
/// Both methods receive the rule's captured node scope. `kind` and `params`
/// describe the logic for checkpointing: a [`crate::codec::RuleRegistry`]
/// rebuilds the logic object from them.
pub trait RuleLogic<T>: Send + Sync {
    /// Whether the rule is ready to fire against the current graph.
    fn predicate(&self, scope: &[NodeId], dag: &Dag<T>) -> anyhow::Result<bool>;

    /// Grow the graph. Runs at most once per rule.
    fn action(&self, scope: &[NodeId], dag: &mut DagExtension<'_, T>) -> anyhow::Result<()>;

    fn kind(&self) -> &str {
        "anonymous"
    }

    fn params(&self) -> Value {
        Value::Null
    }
}

/// Rule logic built from two closures.
pub struct FnRule<P, A> {
    kind: String,
    predicate: P,
    action: A,
}

impl<P, A> FnRule<P, A> {
    pub fn new(kind: impl Into<String>, predicate: P, action: A) -> Self {
        Self {
            kind: kind.into(),
            predicate,
            action,
        }
    }
}

impl<T, P, A> RuleLogic<T> for FnRule<P, A>
where
    P: Fn(&[NodeId], &Dag<T>) -> anyhow::Result<bool> + Send + Sync,
    A: Fn(&[NodeId], &mut DagExtension<'_, T>) -> anyhow::Result<()> + Send + Sync,
{
    fn predicate(&self, scope: &[NodeId], dag: &Dag<T>) -> anyhow::Result<bool> {
        (self.predicate)(scope, dag)
    }

    fn action(&self, scope: &[NodeId], dag: &mut DagExtension<'_, T>) -> anyhow::Result<()> {
        (self.action)(scope, dag)
    }

    fn kind(&self) -> &str {
        &self.kind
    }
}

/// A predicate/action pair over an explicit set of captured nodes.
pub struct Rule<T> {
    id: RuleId,
    name: String,
    scope: Vec<NodeId>,
    logic: Box<dyn RuleLogic<T>>,
}

impl<T> Rule<T> {
    pub fn new(
        name: impl Into<String>,
        scope: Vec<NodeId>,
        logic: impl RuleLogic<T> + 'static,
    ) -> Self {
        Self::with_id(RuleId::new(), name, scope, Box::new(logic))
    }

    /// Rebuild a rule with a known identity (used when restoring checkpoints).
    pub fn with_id(
        id: RuleId,
        name: impl Into<String>,
        scope: Vec<NodeId>,
        logic: Box<dyn RuleLogic<T>>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            scope,
            logic,
        }
    }

    /// Convenience constructor for closure-based rules.
    pub fn from_fns<P, A>(
        name: impl Into<String>,
        scope: Vec<NodeId>,
        predicate: P,
        action: A,
    ) -> Self
    where
        P: Fn(&[NodeId], &Dag<T>) -> anyhow::Result<bool> + Send + Sync + 'static,
        A: Fn(&[NodeId], &mut DagExtension<'_, T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let logic = FnRule::new(name.clone(), predicate, action);
        Self::new(name, scope, logic)
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &[NodeId] {
        &self.scope
    }

    pub fn kind(&self) -> &str {
        self.logic.kind()
    }

    pub fn params(&self) -> Value {
        self.logic.params()
    }

    pub fn is_ready(&self, dag: &Dag<T>) -> anyhow::Result<bool> {
        self.logic.predicate(&self.scope, dag)
    }

    pub fn apply(&self, dag: &mut DagExtension<'_, T>) -> anyhow::Result<()> {
        self.logic.action(&self.scope, dag)
    }
}

impl<T> fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.logic.kind())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
