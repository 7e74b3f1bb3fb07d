// src/exec/poll.rs

//! Concurrent status checks for outstanding proxies.
//!
//! Polls only read the graph. Their outcomes are handed back to the caller,
//! which applies them to the nodes itself; pollers never write node state.

use std::time::Duration;

use futures_util::future::join_all;
use tracing::trace;

use crate::dag::{Dag, NodeId, ProxyStatus};
use crate::exec::{BackendError, BackendResult};

/// What one poll returned for one node.
#[derive(Debug)]
pub struct PollOutcome {
    pub node: NodeId,
    pub status: BackendResult<ProxyStatus>,
}

/// Poll every node that has a proxy and is not yet terminal.
///
/// All polls run concurrently; each is bounded by `timeout`, and a poll that
/// exceeds it is reported as [`BackendError::Timeout`]. Outcomes come back in
/// DAG insertion order.
pub async fn poll_outstanding<T: Sync>(dag: &Dag<T>, timeout: Duration) -> Vec<PollOutcome> {
    let polls = dag
        .nodes()
        .filter(|node| node.needs_poll())
        .filter_map(|node| node.proxy().map(|proxy| (node.id(), proxy)))
        .map(|(id, proxy)| async move {
            let status = match tokio::time::timeout(timeout, proxy.status()).await {
                Ok(status) => status,
                Err(_) => Err(BackendError::Timeout(timeout)),
            };
            trace!(node = %id, ?status, "polled proxy");
            PollOutcome { node: id, status }
        });

    join_all(polls).await
}
