// src/lib.rs

pub mod cli;
pub mod codec;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod history;
pub mod inspect;
pub mod logging;
pub mod rules;
pub mod workflow;

use anyhow::Result;
use tracing::debug;

use crate::cli::{CliArgs, Command};
use crate::config::{RunConfig, load_and_validate};
use crate::inspect::CheckpointSummary;

pub use crate::codec::{CheckpointHooks, OpaqueHooks, RuleRegistry, SerdeHooks};
pub use crate::dag::{Dag, DagExtension, Node, NodeId, NodeState, ProxyStatus};
pub use crate::engine::{
    NodeFailurePolicy, RetryPolicy, RunOptions, RunReport, Runner, Termination,
};
pub use crate::errors::GrowdagError;
pub use crate::exec::{Backend, BackendError, BackendFuture, BackendResult, ResultProxy};
pub use crate::history::{History, HistoryRecord};
pub use crate::rules::{FnRule, Rule, RuleId, RuleLogic};
pub use crate::workflow::Workflow;

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Inspect { file } => {
            debug!(path = %file.display(), "inspecting checkpoint");
            let summary = CheckpointSummary::from_path(&file)?;
            print!("{summary}");
        }
        Command::CheckConfig { file } => {
            let cfg = load_and_validate(&file)?;
            print_config(&cfg);
        }
    }
    Ok(())
}

fn print_config(cfg: &RunConfig) {
    let options = cfg.run_options();
    println!("growdag run config: ok");
    println!("  run.track = {}", options.track);
    println!("  run.poll_interval = {:?}", options.poll_interval);
    println!("  run.poll_timeout = {:?}", options.poll_timeout);
    match options.max_iterations {
        Some(n) => println!("  run.max_iterations = {n}"),
        None => println!("  run.max_iterations = unlimited"),
    }
    match options.deadline {
        Some(d) => println!("  run.deadline = {d:?}"),
        None => println!("  run.deadline = none"),
    }
    println!("  run.on_node_failed = {:?}", options.on_node_failed);
    println!("  retry.submit_attempts = {}", options.retry.submit_attempts);
    println!("  retry.submit_backoff = {:?}", options.retry.submit_backoff);
    println!("  retry.max_poll_failures = {}", options.retry.max_poll_failures);
}
