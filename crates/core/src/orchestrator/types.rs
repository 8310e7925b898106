//! Types for the batch orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::advisor::MediaCategory;
use crate::job::JobOutcome;

/// Errors that prevent a batch from starting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// No files were supplied.
    #[error("no files selected")]
    EmptyBatch,
}

/// The format a file will be converted to, decided before the batch starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedJob {
    /// Position of the file in the batch.
    pub index: usize,
    /// File name.
    pub source_name: String,
    /// Category inferred from the declared media kind.
    pub category: MediaCategory,
    /// Format the job will target.
    pub target_format: String,
    /// Whether `target_format` came from the caller rather than the advisor.
    pub requested: bool,
}

/// Outcome of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub index: usize,
    pub source_name: String,
    pub target_format: String,
    pub outcome: JobOutcome,
}

impl BatchEntry {
    pub fn is_done(&self) -> bool {
        self.outcome.is_done()
    }
}

/// Outcome of a whole batch, one entry per input file in file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub entries: Vec<BatchEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries that finished `Done`.
    pub fn succeeded(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| e.is_done())
    }

    /// Entries that finished `Failed`.
    pub fn failed(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| !e.is_done())
    }

    /// Whether every file converted.
    pub fn is_complete_success(&self) -> bool {
        self.entries.iter().all(|e| e.is_done())
    }
}
