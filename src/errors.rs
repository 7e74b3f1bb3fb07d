// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::codec::OpaqueKind;
use crate::dag::{NodeId, NodeState};
use crate::exec::BackendError;
use crate::rules::RuleId;

#[derive(Error, Debug)]
pub enum GrowdagError {
    #[error("duplicate node identifier: {0}")]
    DuplicateId(NodeId),

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("edge {from} -> {to} would create a cycle")]
    CycleDetected { from: NodeId, to: NodeId },

    #[error("invalid transition for node {node}: {from} -> {to}")]
    InvalidTransition {
        node: NodeId,
        from: NodeState,
        to: NodeState,
    },

    #[error("predicate of rule '{name}' ({rule}) failed: {cause:#}")]
    RuleEvaluation {
        rule: RuleId,
        name: String,
        cause: anyhow::Error,
    },

    #[error("action of rule '{name}' ({rule}) failed: {cause:#}")]
    RuleAction {
        rule: RuleId,
        name: String,
        cause: anyhow::Error,
    },

    #[error("submitting node {node} failed: {source}")]
    BackendSubmit {
        node: NodeId,
        #[source]
        source: BackendError,
    },

    #[error("polling node {node} failed: {source}")]
    BackendPoll {
        node: NodeId,
        #[source]
        source: BackendError,
    },

    #[error("result of node {node} unavailable: {source}")]
    ResultUnavailable {
        node: NodeId,
        #[source]
        source: BackendError,
    },

    #[error("workflow stalled: {pending_rules} pending rule(s), {blocked_nodes} blocked node(s)")]
    Stalled {
        pending_rules: usize,
        blocked_nodes: usize,
    },

    #[error("{0} node(s) failed")]
    NodeFailed(usize),

    #[error("run cancelled")]
    Cancelled,

    #[error("run exceeded {0} iterations")]
    IterationLimit(usize),

    #[error("run exceeded its deadline")]
    DeadlineExceeded,

    #[error("unknown node state: {0:?}")]
    UnknownState(String),

    #[error("{what} in {context} was checkpointed as unserializable")]
    Unserializable { what: OpaqueKind, context: String },

    #[error("malformed checkpoint: {0}")]
    MalformedCheckpoint(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, GrowdagError>;
