//! Batch orchestrator implementation.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use super::types::{BatchEntry, BatchError, BatchResult, PlannedJob};
use crate::advisor::{normalize_format, FormatAdvisor, MediaCategory};
use crate::client::{create_client, ClientError, ConversionClient};
use crate::config::{validate_config, Config, ConfigError};
use crate::input::InputFile;
use crate::job::{Batch, ConversionJob, JobOutcome};
use crate::progress::ProgressSink;
use crate::sequencer::{JobSequencer, SequencerConfig};

/// Accepts file selections and runs them as conversion batches.
///
/// The orchestrator holds no per-batch state: every call to [`start`] builds
/// a fresh batch, so one orchestrator can serve many requests.
///
/// [`start`]: BatchOrchestrator::start
pub struct BatchOrchestrator {
    sequencer: JobSequencer,
}

impl BatchOrchestrator {
    /// Create an orchestrator over the given client.
    pub fn new(client: Arc<dyn ConversionClient>, config: SequencerConfig) -> Self {
        Self {
            sequencer: JobSequencer::new(client, config),
        }
    }

    /// Create an orchestrator from configuration, validating it first.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        validate_config(config)?;
        let client = create_client(config)?;
        Ok(Self::new(client, config.sequencer.clone()))
    }

    /// Name of the conversion client in use.
    pub fn client_name(&self) -> &str {
        self.sequencer.client().name()
    }

    /// Decide the target format of every file without starting anything.
    ///
    /// A non-blank `requested_format` applies to every file. Otherwise each
    /// file gets the advisor's suggestion for its own media kind.
    pub fn plan(
        files: &[Arc<dyn InputFile>],
        requested_format: Option<&str>,
    ) -> Vec<PlannedJob> {
        let requested = requested_format.and_then(normalize_format);

        files
            .iter()
            .enumerate()
            .map(|(index, file)| {
                let category = MediaCategory::from_media_kind(file.media_kind());
                let (target_format, requested) = match &requested {
                    Some(format) => (format.clone(), true),
                    None => (FormatAdvisor::suggest(file.media_kind()).to_string(), false),
                };
                PlannedJob {
                    index,
                    source_name: file.name().to_string(),
                    category,
                    target_format,
                    requested,
                }
            })
            .collect()
    }

    /// Convert every file and report one entry per file, in file order.
    ///
    /// Only an empty selection is an error. Failures of individual files are
    /// recorded in their entries and never stop the rest of the batch.
    pub async fn start(
        &self,
        files: Vec<Arc<dyn InputFile>>,
        requested_format: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<BatchResult, BatchError> {
        if files.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let started_at = Utc::now();
        let plan = Self::plan(&files, requested_format);

        let mut batch = Batch::new();
        for (file, planned) in files.into_iter().zip(plan) {
            debug!(
                index = planned.index,
                source = %planned.source_name,
                category = planned.category.as_str(),
                format = %planned.target_format,
                requested = planned.requested,
                "Planned job"
            );
            batch.push(file, planned.target_format);
        }

        self.sequencer.run(&mut batch, sink).await;

        let entries: Vec<BatchEntry> = batch.into_jobs().into_iter().map(into_entry).collect();
        let result = BatchResult {
            entries,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            files = result.len(),
            succeeded = result.succeeded().count(),
            failed = result.failed().count(),
            "Batch finished"
        );

        Ok(result)
    }
}

fn into_entry(job: ConversionJob) -> BatchEntry {
    let outcome = job.outcome().unwrap_or_else(|| JobOutcome::Failed {
        error: ClientError::conversion(format!("Job ended in state {}", job.state())),
    });

    BatchEntry {
        index: job.index(),
        source_name: job.source_name().to_string(),
        target_format: job.target_format().to_string(),
        outcome,
    }
}
