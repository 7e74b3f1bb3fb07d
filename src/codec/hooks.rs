// src/codec/hooks.rs

//! Hooks for the parts of a workflow the engine cannot serialise itself.
//!
//! Task signatures, rule logic and backend proxies are opaque to the engine.
//! A [`CheckpointHooks`] implementation turns them into JSON and back. Any
//! hook may decline with [`Opaque`], in which case the checkpoint carries an
//! explicit sentinel instead of failing: a checkpoint can always be written,
//! even when it cannot be fully restored.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::dag::NodeId;
use crate::errors::{GrowdagError, Result};
use crate::exec::{Backend, ResultProxy};
use crate::rules::{Rule, RuleId, RuleLogic};

/// Key of the sentinel object written for opaque values.
pub const SENTINEL_KEY: &str = "unserializable";

/// Which kind of value a hook declined to serialise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueKind {
    Task,
    Rule,
    Proxy,
}

impl OpaqueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OpaqueKind::Task => "task",
            OpaqueKind::Rule => "rule",
            OpaqueKind::Proxy => "proxy",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "task" => Some(OpaqueKind::Task),
            "rule" => Some(OpaqueKind::Rule),
            "proxy" => Some(OpaqueKind::Proxy),
            _ => None,
        }
    }
}

impl fmt::Display for OpaqueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "Intentionally not serialised", as opposed to a serialisation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opaque(pub OpaqueKind);

impl Opaque {
    pub fn to_value(self) -> Value {
        let mut obj = Map::new();
        obj.insert(SENTINEL_KEY.to_string(), Value::from(self.0.as_str()));
        Value::Object(obj)
    }

    /// Recognise a sentinel written by [`Opaque::to_value`].
    pub fn detect(value: &Value) -> Option<OpaqueKind> {
        let obj = value.as_object()?;
        if obj.len() != 1 {
            return None;
        }
        obj.get(SENTINEL_KEY)?.as_str().and_then(OpaqueKind::parse)
    }
}

/// Outcome of a serialising hook.
pub type Encoded = std::result::Result<Value, Opaque>;

/// Serialisation hooks for task signatures, rules and result proxies.
///
/// Every method has a default that declines (serialise) or refuses
/// (deserialise), so implementors only override what they support.
///
/// When a checkpoint carries a sentinel where a task or rule should be,
/// decoding asks [`restore_opaque_task`](Self::restore_opaque_task) or
/// [`restore_opaque_rule`](Self::restore_opaque_rule) instead of the regular
/// deserialiser. Hooks that can stand in a placeholder override those.
pub trait CheckpointHooks<T>: Send + Sync {
    fn serialize_task(&self, task: &T) -> Encoded {
        let _ = task;
        Err(Opaque(OpaqueKind::Task))
    }

    fn deserialize_task(&self, data: &Value) -> Result<T> {
        let _ = data;
        Err(unsupported(OpaqueKind::Task))
    }

    /// Rebuild a task that was checkpointed as opaque. `context` names the
    /// node it belonged to.
    fn restore_opaque_task(&self, context: &str) -> Result<T> {
        Err(still_opaque(OpaqueKind::Task, context))
    }

    fn serialize_rule(&self, rule: &Rule<T>) -> Encoded {
        let _ = rule;
        Err(Opaque(OpaqueKind::Rule))
    }

    fn deserialize_rule(&self, data: &Value) -> Result<Rule<T>> {
        let _ = data;
        Err(unsupported(OpaqueKind::Rule))
    }

    /// Rebuild a rule that was checkpointed as opaque. `context` is the rule
    /// list it came from.
    fn restore_opaque_rule(&self, context: &str) -> Result<Rule<T>> {
        Err(still_opaque(OpaqueKind::Rule, context))
    }

    fn serialize_proxy(&self, proxy: &dyn ResultProxy) -> Encoded {
        let _ = proxy;
        Err(Opaque(OpaqueKind::Proxy))
    }

    /// Rebuild a proxy. `Ok(None)` restores the node without one, which is
    /// what happens when no live backend is available to reattach to.
    fn deserialize_proxy(
        &self,
        data: &Value,
        backend: Option<&dyn Backend<T>>,
    ) -> Result<Option<Box<dyn ResultProxy>>> {
        let _ = (data, backend);
        Ok(None)
    }
}

fn unsupported(what: OpaqueKind) -> GrowdagError {
    GrowdagError::Unserializable {
        what,
        context: "hooks without a deserializer".to_string(),
    }
}

fn still_opaque(what: OpaqueKind, context: &str) -> GrowdagError {
    GrowdagError::Unserializable {
        what,
        context: context.to_string(),
    }
}

/// Hooks that serialise nothing: every opaque field becomes a sentinel.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueHooks;

impl<T> CheckpointHooks<T> for OpaqueHooks {}

type RuleFactory<T> = Box<dyn Fn(&Value) -> anyhow::Result<Box<dyn RuleLogic<T>>> + Send + Sync>;

/// Rebuilds rule logic from the `kind` and `params` it was saved with.
pub struct RuleRegistry<T> {
    factories: HashMap<String, RuleFactory<T>>,
}

impl<T> Default for RuleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RuleRegistry<T> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory for rule logic of the given kind.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Value) -> anyhow::Result<Box<dyn RuleLogic<T>>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn build(&self, kind: &str, params: &Value) -> Result<Box<dyn RuleLogic<T>>> {
        let factory = self.factories.get(kind).ok_or_else(|| {
            GrowdagError::MalformedCheckpoint(format!(
                "no rule factory registered for kind '{kind}'"
            ))
        })?;
        factory(params).map_err(GrowdagError::Other)
    }
}

/// Persisted shape of a rule under [`SerdeHooks`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: RuleId,
    pub name: String,
    pub kind: String,
    pub scope: Vec<NodeId>,
    #[serde(default)]
    pub params: Value,
}

/// Full-fidelity hooks for serde-capable task signatures.
///
/// - tasks go through serde;
/// - rules are saved as a [`RuleRecord`] and rebuilt through a
///   [`RuleRegistry`]; rules whose kind is not registered are saved as
///   opaque;
/// - proxies are saved via [`ResultProxy::handle`] and reattached through
///   [`Backend::reattach`].
pub struct SerdeHooks<T> {
    registry: RuleRegistry<T>,
    _task: PhantomData<fn() -> T>,
}

impl<T> SerdeHooks<T> {
    pub fn new(registry: RuleRegistry<T>) -> Self {
        Self {
            registry,
            _task: PhantomData,
        }
    }

    pub fn registry(&self) -> &RuleRegistry<T> {
        &self.registry
    }
}

impl<T> Default for SerdeHooks<T> {
    fn default() -> Self {
        Self::new(RuleRegistry::new())
    }
}

impl<T> CheckpointHooks<T> for SerdeHooks<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize_task(&self, task: &T) -> Encoded {
        serde_json::to_value(task).map_err(|_| Opaque(OpaqueKind::Task))
    }

    fn deserialize_task(&self, data: &Value) -> Result<T> {
        Ok(T::deserialize(data)?)
    }

    fn serialize_rule(&self, rule: &Rule<T>) -> Encoded {
        if !self.registry.contains(rule.kind()) {
            debug!(
                rule = %rule.id(),
                kind = %rule.kind(),
                "rule kind not registered; saving as opaque"
            );
            return Err(Opaque(OpaqueKind::Rule));
        }
        let record = RuleRecord {
            id: rule.id(),
            name: rule.name().to_string(),
            kind: rule.kind().to_string(),
            scope: rule.scope().to_vec(),
            params: rule.params(),
        };
        serde_json::to_value(record).map_err(|_| Opaque(OpaqueKind::Rule))
    }

    fn deserialize_rule(&self, data: &Value) -> Result<Rule<T>> {
        let record = RuleRecord::deserialize(data)?;
        let logic = self.registry.build(&record.kind, &record.params)?;
        Ok(Rule::with_id(record.id, record.name, record.scope, logic))
    }

    fn serialize_proxy(&self, proxy: &dyn ResultProxy) -> Encoded {
        proxy.handle().ok_or(Opaque(OpaqueKind::Proxy))
    }

    fn deserialize_proxy(
        &self,
        data: &Value,
        backend: Option<&dyn Backend<T>>,
    ) -> Result<Option<Box<dyn ResultProxy>>> {
        let Some(backend) = backend else {
            return Ok(None);
        };
        let proxy = backend.reattach(data).map_err(|e| {
            GrowdagError::MalformedCheckpoint(format!("cannot reattach proxy {data}: {e}"))
        })?;
        Ok(Some(proxy))
    }
}
