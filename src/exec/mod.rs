// src/exec/mod.rs

//! Execution layer.
//!
//! The engine never runs tasks itself. It forwards opaque task signatures to
//! a [`Backend`] and tracks progress through the returned [`ResultProxy`]s.
//!
//! - [`backend`] defines the capability traits and the backend error type.
//! - [`poll`] fans out status checks for all outstanding proxies.

pub mod backend;
pub mod poll;

pub use backend::{Backend, BackendError, BackendFuture, BackendResult, ResultProxy};
pub use poll::{PollOutcome, poll_outstanding};
