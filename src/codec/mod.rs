// src/codec/mod.rs

//! Checkpoint codec.
//!
//! - [`tree`] converts a workflow to a transport-neutral JSON tree and back.
//! - [`hooks`] holds the pluggable (de)serialisers for task signatures,
//!   rules and result proxies.

pub mod hooks;
pub mod tree;

pub use hooks::{
    CheckpointHooks, Encoded, Opaque, OpaqueHooks, OpaqueKind, RuleRecord, RuleRegistry,
    SENTINEL_KEY, SerdeHooks,
};
pub use tree::{
    CheckpointTree, DagRecord, NodeRecord, TimestampRecord, decode, decode_detached, encode,
    from_bytes, load_tree, reconcile, save, to_bytes,
};
