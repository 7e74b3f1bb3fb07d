// src/engine/runtime.rs

use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::codec::{CheckpointHooks, OpaqueHooks, encode};
use crate::dag::{Dag, Node, NodeState, ProxyStatus};
use crate::errors::{GrowdagError, Result};
use crate::exec::{Backend, BackendResult, ResultProxy, poll_outstanding};
use crate::history::History;
use crate::workflow::Workflow;

use super::core::{IterationProgress, apply_poll_outcomes, decide, ready_nodes};
use super::{NodeFailurePolicy, RunOptions, RunReport, Termination};

/// Drives a [`Workflow`] to completion against a [`Backend`].
///
/// ```ignore
/// let report = Runner::new(&backend)
///     .options(RunOptions { track: true, ..Default::default() })
///     .cancel(cancel_rx)
///     .run(workflow)
///     .await;
/// ```
///
/// The runner owns the workflow for the duration of the run and hands it
/// back in the [`RunReport`], whatever the outcome. All state mutation
/// happens on the task calling `run`; only the polls run concurrently.
pub struct Runner<'a, T> {
    backend: &'a dyn Backend<T>,
    hooks: &'a dyn CheckpointHooks<T>,
    options: RunOptions,
    history: Option<History>,
    cancel: Option<watch::Receiver<bool>>,
}

impl<T> fmt::Debug for Runner<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("options", &self.options)
            .field("tracking", &self.history.is_some())
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a, T: Send + Sync> Runner<'a, T> {
    pub fn new<B: Backend<T> + 'a>(backend: &'a B) -> Self {
        Self::from_dyn(backend)
    }

    pub fn from_dyn(backend: &'a dyn Backend<T>) -> Self {
        Self {
            backend,
            hooks: &OpaqueHooks,
            options: RunOptions::default(),
            history: None,
            cancel: None,
        }
    }

    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Hooks used to encode history snapshots.
    pub fn hooks(mut self, hooks: &'a dyn CheckpointHooks<T>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Record snapshots into an existing log instead of a fresh one.
    /// Implies tracking.
    pub fn history(mut self, history: History) -> Self {
        self.history = Some(history);
        self.options.track = true;
        self
    }

    /// Stop the run once `true` is sent on the channel.
    pub fn cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Main scheduling loop.
    pub async fn run(mut self, mut workflow: Workflow<T>) -> RunReport<T> {
        let started = Instant::now();
        let history = match self.history.take() {
            Some(history) => Some(history),
            None if self.options.track => Some(History::new()),
            None => None,
        };

        info!(
            nodes = workflow.dag().len(),
            rules = workflow.rules().len(),
            "workflow run started"
        );

        let mut iterations = 0;
        let termination = loop {
            if self.is_cancelled() {
                break Termination::Cancelled;
            }
            if self
                .options
                .max_iterations
                .is_some_and(|max| iterations >= max)
            {
                break Termination::IterationLimit(iterations);
            }
            if self
                .options
                .deadline
                .is_some_and(|deadline| started.elapsed() >= deadline)
            {
                break Termination::DeadlineExceeded;
            }

            iterations += 1;
            let progress = match self.iterate(&mut workflow, history.as_ref()).await {
                Ok(progress) => progress,
                Err(e) => {
                    error!(error = %e, iteration = iterations, "iteration failed");
                    break Termination::Error(e);
                }
            };
            debug!(iteration = iterations, ?progress, "iteration finished");

            if let Some(termination) = decide(&workflow, &progress, self.options.on_node_failed) {
                break termination;
            }

            let remaining = self
                .options
                .deadline
                .map(|deadline| deadline.saturating_sub(started.elapsed()));
            if !self.pause(remaining).await {
                break Termination::Cancelled;
            }
        };

        match &termination {
            Termination::Completed => info!(iterations, "workflow completed"),
            other => warn!(iterations, termination = ?other, "workflow did not complete"),
        }

        RunReport {
            workflow,
            termination,
            iterations,
            history,
        }
    }

    async fn iterate(
        &self,
        workflow: &mut Workflow<T>,
        history: Option<&History>,
    ) -> Result<IterationProgress> {
        let rules_applied = workflow.apply_rules()?.len();
        let submitted = self.submit_ready(workflow.dag_mut()).await?;

        let outcomes = poll_outstanding(workflow.dag(), self.options.poll_timeout).await;
        let state_changes = apply_poll_outcomes(
            workflow.dag_mut(),
            outcomes,
            self.options.retry.max_poll_failures,
            Utc::now(),
        );

        if let Some(history) = history {
            history.record(encode(workflow, self.hooks)?);
        }

        Ok(IterationProgress {
            rules_applied,
            submitted,
            state_changes,
        })
    }

    /// Submit every ready node in insertion order.
    ///
    /// A node the backend refuses (after retries) goes straight to `FAILED`.
    /// Under [`NodeFailurePolicy::Abort`] no further node is submitted once
    /// anything has failed.
    async fn submit_ready(&self, dag: &mut Dag<T>) -> Result<usize> {
        let abort_on_failure = self.options.on_node_failed == NodeFailurePolicy::Abort;
        let mut submitted = 0;

        for id in ready_nodes(dag) {
            if abort_on_failure && !dag.nodes_in_state(NodeState::Failed).is_empty() {
                debug!("a node has failed; not submitting further nodes");
                break;
            }

            let outcome = self.submit_with_retry(dag.node_or_err(id)?).await;

            let now = Utc::now();
            let node = dag.node_mut(id).ok_or(GrowdagError::UnknownNode(id))?;
            match outcome {
                Ok(proxy) => {
                    node.mark_submitted(Some(proxy), now)?;
                    info!(node = %id, name = %node.name(), "task handed to backend");
                }
                Err(source) => {
                    let err = GrowdagError::BackendSubmit { node: id, source };
                    error!(
                        name = %node.name(),
                        error = %err,
                        "submission failed; marking node FAILED"
                    );
                    node.mark_submitted(None, now)?;
                    node.observe(ProxyStatus::Failed, now);
                }
            }
            submitted += 1;
        }

        Ok(submitted)
    }

    async fn submit_with_retry(&self, node: &Node<T>) -> BackendResult<Box<dyn ResultProxy>> {
        let attempts = self.options.retry.submit_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.backend.submit(node.task()).await {
                Ok(proxy) => return Ok(proxy),
                Err(e) if attempt < attempts => {
                    let delay = self.options.retry.submit_backoff * attempt;
                    warn!(
                        node = %node.id(),
                        name = %node.name(),
                        attempt,
                        attempts,
                        error = %e,
                        ?delay,
                        "submit failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Wait for the next iteration. Returns `false` if cancelled meanwhile.
    async fn pause(&mut self, remaining: Option<Duration>) -> bool {
        let delay = match remaining {
            Some(remaining) => self.options.poll_interval.min(remaining),
            None => self.options.poll_interval,
        };

        let Some(rx) = self.cancel.as_mut() else {
            tokio::time::sleep(delay).await;
            return true;
        };

        let changed = tokio::select! {
            _ = tokio::time::sleep(delay) => None,
            changed = rx.changed() => Some(changed.is_ok()),
        };

        match changed {
            None => true,
            Some(true) => !*rx.borrow(),
            Some(false) => {
                // Sender gone: nobody can cancel any more.
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}
