//! Error types for the client module.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a conversion client can report for a single job.
///
/// These are always captured on the job that produced them and never abort
/// the rest of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientError {
    /// The service rejected the input (bad auth, unsupported format,
    /// payload too large, unreadable input).
    #[error("Submission rejected: {reason}")]
    Submission { reason: String },

    /// The service accepted the job but processing failed.
    #[error("Conversion failed: {reason}")]
    Conversion { reason: String },

    /// The job did not complete within the bounded wait.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

impl ClientError {
    /// Creates a new submission error.
    pub fn submission(reason: impl Into<String>) -> Self {
        Self::Submission {
            reason: reason.into(),
        }
    }

    /// Creates a new conversion error.
    pub fn conversion(reason: impl Into<String>) -> Self {
        Self::Conversion {
            reason: reason.into(),
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Submission { .. } => "submission",
            Self::Conversion { .. } => "conversion",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
