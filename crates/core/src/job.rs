//! Conversion jobs and their lifecycle.
//!
//! A job moves strictly forward through
//! `Pending -> Uploading -> Converting -> Finalizing -> Done`, or to `Failed`
//! from any non-terminal state. Jobs are created fresh for every batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::client::{ClientError, ResultReference};
use crate::input::InputFile;

/// Lifecycle state of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Uploading,
    Converting,
    Finalizing,
    Done,
    Failed,
}

impl JobState {
    /// Returns the string representation for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Uploading => "uploading",
            JobState::Converting => "converting",
            JobState::Finalizing => "finalizing",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Pending, Uploading)
            | (Uploading, Converting)
            | (Converting, Finalizing)
            | (Finalizing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from misusing a job's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("Target format cannot change once the job is {state}")]
    FormatLocked { state: JobState },
}

/// Final outcome of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Done { result_reference: ResultReference },
    Failed { error: ClientError },
}

impl JobOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, JobOutcome::Done { .. })
    }
}

/// One file's conversion.
pub struct ConversionJob {
    index: usize,
    source: Arc<dyn InputFile>,
    target_format: String,
    state: JobState,
    result_reference: Option<ResultReference>,
    error: Option<ClientError>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ConversionJob {
    /// Creates a pending job for the file at `index` in its batch.
    pub fn new(index: usize, source: Arc<dyn InputFile>, target_format: impl Into<String>) -> Self {
        Self {
            index,
            source,
            target_format: target_format.into(),
            state: JobState::Pending,
            result_reference: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn source(&self) -> &Arc<dyn InputFile> {
        &self.source
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn target_format(&self) -> &str {
        &self.target_format
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Present only when the job is `Done`.
    pub fn result_reference(&self) -> Option<&ResultReference> {
        self.result_reference.as_ref()
    }

    /// Present only when the job is `Failed`.
    pub fn error(&self) -> Option<&ClientError> {
        self.error.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Overrides the target format. Only allowed while `Pending`.
    pub fn set_target_format(&mut self, format: impl Into<String>) -> Result<(), JobError> {
        if self.state != JobState::Pending {
            return Err(JobError::FormatLocked { state: self.state });
        }
        self.target_format = format.into();
        Ok(())
    }

    fn transition(&mut self, next: JobState) -> Result<(), JobError> {
        if !self.state.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// `Pending -> Uploading`.
    pub fn begin_upload(&mut self) -> Result<(), JobError> {
        self.transition(JobState::Uploading)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `Uploading -> Converting`.
    pub fn begin_conversion(&mut self) -> Result<(), JobError> {
        self.transition(JobState::Converting)
    }

    /// `Converting -> Finalizing`.
    pub fn begin_finalizing(&mut self) -> Result<(), JobError> {
        self.transition(JobState::Finalizing)
    }

    /// `Finalizing -> Done`, recording the result reference.
    pub fn complete(&mut self, reference: ResultReference) -> Result<(), JobError> {
        self.transition(JobState::Done)?;
        self.result_reference = Some(reference);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Any non-terminal state `-> Failed`, recording the cause.
    pub fn fail(&mut self, error: ClientError) -> Result<(), JobError> {
        self.transition(JobState::Failed)?;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// The outcome, once the job is terminal.
    pub fn outcome(&self) -> Option<JobOutcome> {
        match self.state {
            JobState::Done => self
                .result_reference
                .clone()
                .map(|result_reference| JobOutcome::Done { result_reference }),
            JobState::Failed => self
                .error
                .clone()
                .map(|error| JobOutcome::Failed { error }),
            _ => None,
        }
    }
}

impl fmt::Debug for ConversionJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionJob")
            .field("index", &self.index)
            .field("source", &self.source.name())
            .field("target_format", &self.target_format)
            .field("state", &self.state)
            .field("result_reference", &self.result_reference)
            .field("error", &self.error)
            .finish()
    }
}

/// An ordered set of jobs built for one conversion request.
#[derive(Debug, Default)]
pub struct Batch {
    jobs: Vec<ConversionJob>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a job for `source`; its index is its position in the batch.
    pub fn push(&mut self, source: Arc<dyn InputFile>, target_format: impl Into<String>) {
        let index = self.jobs.len();
        self.jobs.push(ConversionJob::new(index, source, target_format));
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[ConversionJob] {
        &self.jobs
    }

    pub fn jobs_mut(&mut self) -> &mut [ConversionJob] {
        &mut self.jobs
    }

    pub fn into_jobs(self) -> Vec<ConversionJob> {
        self.jobs
    }
}
