use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use growdag::dag::ProxyStatus;
use growdag::exec::{Backend, BackendError, BackendFuture, BackendResult, ResultProxy};
use serde_json::{Value, json};

/// How a scripted task ends.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Fail,
    /// Reports `Pending` forever.
    Never,
}

/// Per-task behaviour of the [`FakeBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    /// Submissions rejected before one is accepted.
    pub submit_failures: u32,
    /// Polls that error before any status is reported.
    pub poll_errors: u32,
    /// Polls reporting `Running` before the outcome is reported.
    pub running_polls: u32,
    pub outcome: Outcome,
}

impl Script {
    pub fn succeed(result: Value) -> Self {
        Self {
            submit_failures: 0,
            poll_errors: 0,
            running_polls: 0,
            outcome: Outcome::Success(result),
        }
    }

    pub fn fail() -> Self {
        Self {
            outcome: Outcome::Fail,
            ..Self::succeed(Value::Null)
        }
    }

    pub fn never() -> Self {
        Self {
            outcome: Outcome::Never,
            ..Self::succeed(Value::Null)
        }
    }

    pub fn running_for(mut self, polls: u32) -> Self {
        self.running_polls = polls;
        self
    }

    pub fn reject_submits(mut self, times: u32) -> Self {
        self.submit_failures = times;
        self
    }

    pub fn poll_errors(mut self, times: u32) -> Self {
        self.poll_errors = times;
        self
    }
}

/// A backend over `String` tasks that never runs anything.
///
/// - records which tasks were accepted, in order
/// - answers polls from a per-task [`Script`]; unscripted tasks succeed on
///   the first poll with the result `"<task>:done"`
/// - can reattach to proxies from their handles
#[derive(Debug, Default)]
pub struct FakeBackend {
    scripts: Mutex<HashMap<String, Script>>,
    attempts: Mutex<HashMap<String, u32>>,
    submitted: Arc<Mutex<Vec<String>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, task: &str, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(task.to_string(), script);
        self
    }

    /// Tasks accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    /// Shared handle to the submission log.
    pub fn submitted_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.submitted)
    }

    /// Submission attempts made for `task`, rejected ones included.
    pub fn attempts(&self, task: &str) -> u32 {
        self.attempts.lock().unwrap().get(task).copied().unwrap_or(0)
    }

    fn script_for(&self, task: &str) -> Script {
        self.scripts
            .lock()
            .unwrap()
            .get(task)
            .cloned()
            .unwrap_or_else(|| Script::succeed(json!(format!("{task}:done"))))
    }
}

impl Backend<String> for FakeBackend {
    fn submit<'a>(&'a self, task: &'a String) -> BackendFuture<'a, Box<dyn ResultProxy>> {
        Box::pin(async move {
            let script = self.script_for(task);
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let count = attempts.entry(task.clone()).or_insert(0);
                *count += 1;
                *count
            };

            if attempt <= script.submit_failures {
                return Err(BackendError::Submit(format!(
                    "task '{task}' rejected (attempt {attempt})"
                )));
            }

            self.submitted.lock().unwrap().push(task.clone());
            Ok(Box::new(FakeProxy::new(task.clone(), script, 0)) as Box<dyn ResultProxy>)
        })
    }

    fn reattach(&self, handle: &Value) -> BackendResult<Box<dyn ResultProxy>> {
        let task = handle
            .get("task")
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::Poll(format!("bad handle {handle}")))?;
        let polls = handle.get("polls").and_then(Value::as_u64).unwrap_or(0) as u32;
        Ok(Box::new(FakeProxy::new(
            task.to_string(),
            self.script_for(task),
            polls,
        )))
    }
}

/// Proxy handed out by [`FakeBackend`].
#[derive(Debug)]
pub struct FakeProxy {
    task: String,
    script: Script,
    polls: AtomicU32,
}

impl FakeProxy {
    pub fn new(task: String, script: Script, polls: u32) -> Self {
        Self {
            task,
            script,
            polls: AtomicU32::new(polls),
        }
    }

    fn next_status(&self) -> BackendResult<ProxyStatus> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst);
        if n < self.script.poll_errors {
            return Err(BackendError::Poll(format!(
                "task '{}' unreachable (poll {n})",
                self.task
            )));
        }
        if n - self.script.poll_errors < self.script.running_polls {
            return Ok(ProxyStatus::Running);
        }
        Ok(match self.script.outcome {
            Outcome::Success(_) => ProxyStatus::Success,
            Outcome::Fail => ProxyStatus::Failed,
            Outcome::Never => ProxyStatus::Pending,
        })
    }
}

impl ResultProxy for FakeProxy {
    fn status(&self) -> BackendFuture<'_, ProxyStatus> {
        Box::pin(async move { self.next_status() })
    }

    fn result(&self) -> BackendResult<Value> {
        match &self.script.outcome {
            Outcome::Success(value) => Ok(value.clone()),
            other => Err(BackendError::Result(format!(
                "task '{}' has no result ({other:?})",
                self.task
            ))),
        }
    }

    fn handle(&self) -> Option<Value> {
        Some(json!({
            "task": self.task,
            "polls": self.polls.load(Ordering::SeqCst),
        }))
    }
}
