// src/dag/mod.rs

//! DAG representation.
//!
//! - [`node`] holds a single task instance and its lifecycle metadata.
//! - [`state`] defines the node state machine.
//! - [`graph`] holds the acyclic node/edge container.
//! - [`extension`] is the staged view rule actions use to grow the graph.

pub mod extension;
pub mod graph;
pub mod node;
pub mod state;

pub use extension::DagExtension;
pub use graph::Dag;
pub use node::{Node, NodeId, Timestamps};
pub use state::{NodeState, ProxyStatus};
