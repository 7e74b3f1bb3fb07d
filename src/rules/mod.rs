// src/rules/mod.rs

//! Rules grow the DAG while a run is in progress.
//!
//! - [`rule`] defines [`Rule`], its identity and the [`RuleLogic`] capability.
//! - [`engine`] applies ready rules once per scheduler iteration.

pub mod engine;
pub mod rule;

pub use engine::apply_ready_rules;
pub use rule::{FnRule, Rule, RuleId, RuleLogic};
