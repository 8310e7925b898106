//! Drives a batch of jobs through the conversion client.
//!
//! Every job goes `Uploading -> Converting -> Finalizing -> Done`, or ends
//! `Failed` with the cause recorded on the job. A failed job never stops the
//! rest of the batch.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{ClientError, ConversionClient};
use crate::job::{Batch, ConversionJob, JobError, JobState};
use crate::progress::{ProgressSink, ProgressTracker};

/// Buffer for stage labels between a client call and the tracker.
const STAGE_BUFFER: usize = 16;

/// Stand-in deadline for timeouts too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Configuration for the job sequencer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerConfig {
    /// Maximum jobs in flight at once. 1 processes files one after another.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Bound on a whole job, submit and await together, in seconds.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
}

fn default_max_concurrent_jobs() -> usize {
    1
}

fn default_job_timeout() -> u64 {
    900 // 15 minutes
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_timeout_secs: default_job_timeout(),
        }
    }
}

impl SequencerConfig {
    /// Sets the maximum concurrent jobs.
    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Sets the per-job timeout in seconds.
    pub fn with_job_timeout(mut self, timeout_secs: u64) -> Self {
        self.job_timeout_secs = timeout_secs;
        self
    }
}

/// Runs batches of jobs against a conversion client.
pub struct JobSequencer {
    client: Arc<dyn ConversionClient>,
    config: SequencerConfig,
}

impl JobSequencer {
    /// Creates a new sequencer.
    pub fn new(client: Arc<dyn ConversionClient>, config: SequencerConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &Arc<dyn ConversionClient> {
        &self.client
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Runs every job of the batch to a terminal state.
    ///
    /// Jobs that are not `Pending` are left untouched. Progress events are
    /// delivered to `sink` in file order.
    pub async fn run(&self, batch: &mut Batch, sink: &dyn ProgressSink) {
        let stages_per_job = self.client.stage_labels().len();
        let tracker = ProgressTracker::new(sink, batch.len(), stages_per_job);
        let concurrency = self.config.max_concurrent_jobs.max(1);

        info!(
            jobs = batch.len(),
            client = self.client.name(),
            concurrency,
            "Starting batch"
        );

        stream::iter(batch.jobs_mut().iter_mut())
            .map(|job| self.run_job(job, &tracker))
            .buffered(concurrency)
            .collect::<Vec<()>>()
            .await;
    }

    async fn run_job(&self, job: &mut ConversionJob, tracker: &ProgressTracker<'_>) {
        let index = job.index();

        if job.state() != JobState::Pending {
            warn!(index, state = %job.state(), "Skipping job that is not pending");
            tracker.finish(index, job.error());
            return;
        }

        match self.drive(job, tracker).await {
            Ok(()) => {
                info!(
                    index,
                    source = job.source_name(),
                    format = job.target_format(),
                    reference = %job.result_reference().map(|r| r.as_str()).unwrap_or_default(),
                    "Job done"
                );
                tracker.finish(index, None);
            }
            Err(error) => {
                warn!(
                    index,
                    source = job.source_name(),
                    format = job.target_format(),
                    error = %error,
                    "Job failed"
                );
                if let Err(e) = job.fail(error.clone()) {
                    warn!(index, error = %e, "Could not mark job failed");
                }
                tracker.finish(index, Some(&error));
            }
        }
    }

    async fn drive(
        &self,
        job: &mut ConversionJob,
        tracker: &ProgressTracker<'_>,
    ) -> Result<(), ClientError> {
        let index = job.index();
        let source_name = job.source_name().to_string();
        let target_format = job.target_format().to_string();

        let bytes = job.source().read().await.map_err(|e| {
            ClientError::submission(format!("Failed to read {}: {}", source_name, e))
        })?;

        job.begin_upload().map_err(lifecycle_error)?;
        debug!(index, source = %source_name, bytes = bytes.len(), "Uploading");

        let now = Instant::now();
        let deadline = now
            .checked_add(Duration::from_secs(self.config.job_timeout_secs))
            .unwrap_or_else(|| now + FAR_FUTURE);
        let handle = self
            .bounded(deadline, self.with_stages(index, tracker, |stage_tx| {
                self.client
                    .submit(bytes, &source_name, &target_format, stage_tx)
            }))
            .await?;

        job.begin_conversion().map_err(lifecycle_error)?;
        debug!(index, handle = %handle, "Converting");

        let reference = self
            .bounded(deadline, self.with_stages(index, tracker, |stage_tx| {
                self.client.await_result(&handle, stage_tx)
            }))
            .await?;

        job.begin_finalizing().map_err(lifecycle_error)?;
        debug!(index, reference = %reference, "Finalizing");

        if reference.is_empty() {
            return Err(ClientError::conversion(
                "Service returned an empty result reference",
            ));
        }

        job.complete(reference).map_err(lifecycle_error)?;
        Ok(())
    }

    /// Runs a client call while forwarding the stage labels it reports.
    ///
    /// The call owns the only sender, so forwarding ends when the call does.
    async fn with_stages<T, F, Fut>(
        &self,
        index: usize,
        tracker: &ProgressTracker<'_>,
        call: F,
    ) -> T
    where
        F: FnOnce(mpsc::Sender<String>) -> Fut,
        Fut: Future<Output = T>,
    {
        let (stage_tx, mut stage_rx) = mpsc::channel::<String>(STAGE_BUFFER);
        let forward = async {
            while let Some(label) = stage_rx.recv().await {
                tracker.stage(index, label);
            }
        };

        let (result, ()) = tokio::join!(call(stage_tx), forward);
        result
    }

    /// Bounds a client call by the job's deadline, shared by all its calls.
    async fn bounded<T>(
        &self,
        deadline: Instant,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        let timeout_secs = self.config.job_timeout_secs;
        tokio::time::timeout_at(deadline, call)
            .await
            .unwrap_or(Err(ClientError::Timeout { timeout_secs }))
    }
}

fn lifecycle_error(e: JobError) -> ClientError {
    ClientError::conversion(format!("Job lifecycle error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{stages, SimulatedClient};
    use crate::input::MemoryFile;
    use crate::testing::{FailAt, MockClient, RecordingSink};

    fn batch(names: &[&str]) -> Batch {
        let mut batch = Batch::new();
        for name in names {
            batch.push(Arc::new(MemoryFile::new(*name, "", b"data".to_vec())), "pdf");
        }
        batch
    }

    #[test]
    fn test_default_config() {
        let config = SequencerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.job_timeout_secs, 900);

        let config = config.with_max_concurrent_jobs(4).with_job_timeout(30);
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.job_timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_simulated_batch_completes() {
        let sequencer = JobSequencer::new(
            Arc::new(SimulatedClient::instant()),
            SequencerConfig::default(),
        );
        let mut batch = batch(&["a.doc", "b.txt"]);
        let sink = RecordingSink::new();

        sequencer.run(&mut batch, &sink).await;

        for job in batch.jobs() {
            assert_eq!(job.state(), JobState::Done);
        }
        assert_eq!(batch.jobs()[0].result_reference().unwrap().as_str(), "a.pdf");
        assert_eq!(batch.jobs()[1].result_reference().unwrap().as_str(), "b.pdf");

        let events = sink.events();
        assert_eq!(events.len(), 8);
        assert_eq!(events[0].stage_label, stages::UPLOADING);
        assert_eq!(events[7].fraction, 1.0);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let client = MockClient::new();
        client
            .fail_source("b.txt", FailAt::Submit, ClientError::submission("too large"))
            .await;

        let sequencer = JobSequencer::new(Arc::new(client.clone()), SequencerConfig::default());
        let mut batch = batch(&["a.txt", "b.txt", "c.txt"]);
        sequencer.run(&mut batch, &RecordingSink::new()).await;

        let states: Vec<_> = batch.jobs().iter().map(|j| j.state()).collect();
        assert_eq!(states, vec![JobState::Done, JobState::Failed, JobState::Done]);
        assert_eq!(batch.jobs()[1].error().unwrap().kind(), "submission");
        assert_eq!(client.submission_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_only_the_slow_job() {
        let client = MockClient::new();
        client.set_await_delay("slow.txt", Duration::from_secs(60)).await;

        let sequencer = JobSequencer::new(
            Arc::new(client),
            SequencerConfig::default().with_job_timeout(5),
        );
        let mut batch = batch(&["fast.txt", "slow.txt", "other.txt"]);
        sequencer.run(&mut batch, &RecordingSink::new()).await;

        assert_eq!(batch.jobs()[0].state(), JobState::Done);
        assert_eq!(
            batch.jobs()[1].error(),
            Some(&ClientError::Timeout { timeout_secs: 5 })
        );
        assert_eq!(batch.jobs()[2].state(), JobState::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_spans_submit_and_await() {
        let client = MockClient::new();
        // Each call fits the limit alone, together they do not.
        client.set_submit_delay("split.txt", Duration::from_secs(4)).await;
        client.set_await_delay("split.txt", Duration::from_secs(4)).await;

        let sequencer = JobSequencer::new(
            Arc::new(client),
            SequencerConfig::default().with_job_timeout(5),
        );
        let mut batch = batch(&["split.txt"]);

        let start = tokio::time::Instant::now();
        sequencer.run(&mut batch, &RecordingSink::new()).await;

        assert_eq!(
            batch.jobs()[0].error(),
            Some(&ClientError::Timeout { timeout_secs: 5 })
        );
        assert!(start.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_empty_reference_fails_job() {
        let client = MockClient::new();
        client.set_result("blank.txt", "").await;

        let sequencer = JobSequencer::new(Arc::new(client), SequencerConfig::default());
        let mut batch = batch(&["blank.txt"]);
        sequencer.run(&mut batch, &RecordingSink::new()).await;

        let job = &batch.jobs()[0];
        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(job.error().unwrap().kind(), "conversion");
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_with_submission_error() {
        let client = MockClient::new();
        let sequencer = JobSequencer::new(Arc::new(client.clone()), SequencerConfig::default());

        let mut batch = Batch::new();
        batch.push(Arc::new(crate::testing::UnreadableFile::new("gone.mov")), "mp4");
        sequencer.run(&mut batch, &RecordingSink::new()).await;

        let job = &batch.jobs()[0];
        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(job.error().unwrap().kind(), "submission");
        assert_eq!(client.submission_count().await, 0);
    }

    #[tokio::test]
    async fn test_non_pending_jobs_are_skipped() {
        let client = MockClient::new();
        let sequencer = JobSequencer::new(Arc::new(client.clone()), SequencerConfig::default());

        let mut batch = batch(&["a.txt", "b.txt"]);
        batch.jobs_mut()[0]
            .fail(ClientError::conversion("already failed"))
            .unwrap();
        let sink = RecordingSink::new();
        sequencer.run(&mut batch, &sink).await;

        assert_eq!(batch.jobs()[0].error().unwrap().kind(), "conversion");
        assert_eq!(batch.jobs()[1].state(), JobState::Done);
        assert_eq!(client.submission_count().await, 1);
        assert_eq!(sink.events().last().unwrap().fraction, 1.0);
    }
}
