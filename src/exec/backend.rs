// src/exec/backend.rs

//! Pluggable execution backend abstraction.
//!
//! The scheduler loop talks to a [`Backend`] instead of any concrete process
//! pool or queue. A backend hands out one [`ResultProxy`] per submitted task;
//! the proxy is owned by the node and is the only source of truth for the
//! node's state after submission.
//!
//! Tests plug in a scripted backend (see the `growdag-test-utils` crate)
//! that never spawns anything.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::dag::ProxyStatus;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("submission rejected: {0}")]
    Submit(String),

    #[error("status unavailable: {0}")]
    Poll(String),

    #[error("result unavailable: {0}")]
    Result(String),

    #[error("poll timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend cannot reattach to persisted proxies")]
    ReattachUnsupported,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Boxed future returned by backend and proxy operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = BackendResult<T>> + Send + 'a>>;

/// Handle to a task that has been submitted to a backend.
pub trait ResultProxy: Send + Sync + fmt::Debug {
    /// Ask the backend where the task currently stands.
    ///
    /// Must not wait for the task to finish.
    fn status(&self) -> BackendFuture<'_, ProxyStatus>;

    /// Value produced by the task. Only defined once `status` is terminal.
    fn result(&self) -> BackendResult<Value>;

    /// Serialisable description of this proxy (job id, queue key, ...), if
    /// the backend can later [`Backend::reattach`] to it.
    fn handle(&self) -> Option<Value> {
        None
    }
}

/// Trait abstracting where tasks run.
pub trait Backend<T>: Send + Sync {
    /// Fire `task` asynchronously and return a proxy for it.
    ///
    /// The implementation must return as soon as the task is accepted; it
    /// must never wait for completion.
    fn submit<'a>(&'a self, task: &'a T) -> BackendFuture<'a, Box<dyn ResultProxy>>;

    /// Rebuild a live proxy from a handle previously produced by
    /// [`ResultProxy::handle`].
    fn reattach(&self, handle: &Value) -> BackendResult<Box<dyn ResultProxy>> {
        let _ = handle;
        Err(BackendError::ReattachUnsupported)
    }
}
