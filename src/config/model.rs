// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::engine::{NodeFailurePolicy, RetryPolicy, RunOptions};

/// Run configuration exactly as read from a TOML file.
///
/// ```toml
/// [run]
/// track = true
/// poll_interval_ms = 500
/// poll_timeout_ms = 5000
/// max_iterations = 10000
/// deadline_secs = 3600
/// on_node_failed = "abort"
///
/// [retry]
/// submit_attempts = 3
/// submit_backoff_ms = 100
/// max_poll_failures = 3
/// ```
///
/// Both sections and every key are optional; missing values fall back to
/// [`RunOptions::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRunConfig {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub retry: RetrySection,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
    /// Record a snapshot per iteration.
    pub track: bool,
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub max_iterations: Option<usize>,
    /// Wall-clock budget for the whole run, in seconds.
    pub deadline_secs: Option<u64>,
    /// `"abort"` or `"continue"`.
    pub on_node_failed: NodeFailurePolicy,
}

impl Default for RunSection {
    fn default() -> Self {
        let defaults = RunOptions::default();
        Self {
            track: defaults.track,
            poll_interval_ms: millis(defaults.poll_interval),
            poll_timeout_ms: millis(defaults.poll_timeout),
            max_iterations: defaults.max_iterations,
            deadline_secs: defaults.deadline.map(|d| d.as_secs()),
            on_node_failed: defaults.on_node_failed,
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub submit_attempts: u32,
    pub submit_backoff_ms: u64,
    pub max_poll_failures: u32,
}

impl Default for RetrySection {
    fn default() -> Self {
        let defaults = RetryPolicy::default();
        Self {
            submit_attempts: defaults.submit_attempts,
            submit_backoff_ms: millis(defaults.submit_backoff),
            max_poll_failures: defaults.max_poll_failures,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// A validated run configuration.
///
/// Only obtainable through `TryFrom<RawRunConfig>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct RunConfig {
    run: RunSection,
    retry: RetrySection,
}

impl RunConfig {
    pub(crate) fn new_unchecked(run: RunSection, retry: RetrySection) -> Self {
        Self { run, retry }
    }

    pub fn run(&self) -> &RunSection {
        &self.run
    }

    pub fn retry(&self) -> &RetrySection {
        &self.retry
    }

    /// The scheduler options described by this config.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            track: self.run.track,
            poll_interval: Duration::from_millis(self.run.poll_interval_ms),
            poll_timeout: Duration::from_millis(self.run.poll_timeout_ms),
            max_iterations: self.run.max_iterations,
            deadline: self.run.deadline_secs.map(Duration::from_secs),
            on_node_failed: self.run.on_node_failed,
            retry: RetryPolicy {
                submit_attempts: self.retry.submit_attempts,
                submit_backoff: Duration::from_millis(self.retry.submit_backoff_ms),
                max_poll_failures: self.retry.max_poll_failures,
            },
        }
    }
}
