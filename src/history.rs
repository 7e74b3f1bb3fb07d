// src/history.rs

//! Append-only log of timestamped workflow snapshots.
//!
//! The scheduler appends one checkpoint tree per iteration when tracking is
//! enabled. A [`History`] is a cheap handle: clones share the same log, so an
//! observer can keep one and read while the run is still going.

use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub snapshot: Value,
}

#[derive(Debug, Clone, Default)]
pub struct History {
    records: Arc<RwLock<Vec<HistoryRecord>>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot taken now.
    pub fn record(&self, snapshot: Value) {
        self.push(HistoryRecord {
            timestamp: Utc::now(),
            snapshot,
        });
    }

    pub fn push(&self, record: HistoryRecord) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all records, oldest first.
    pub fn records(&self) -> Vec<HistoryRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<HistoryRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// The whole log as a JSON array of `{timestamp, snapshot}` objects.
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.records())?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_vec_pretty(&self.records())?)?;
        Ok(())
    }

    /// Read a log written by [`History::write_to`].
    pub fn read_from(path: impl AsRef<Path>) -> Result<Vec<HistoryRecord>> {
        let contents = fs::read(path)?;
        Ok(serde_json::from_slice(&contents)?)
    }
}
