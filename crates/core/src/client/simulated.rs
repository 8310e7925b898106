//! Network-free conversion client.
//!
//! Walks every job through four fixed stages with a fixed delay each and
//! fabricates a result reference from the source name. Lets the whole
//! orchestration run without a live backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::config::SimulatedConfig;
use super::error::ClientError;
use super::traits::{report_stage, ConversionClient};
use super::types::{stages, JobHandle, ResultReference};

const STAGES: [&str; 4] = [
    stages::UPLOADING,
    stages::PROCESSING,
    stages::OPTIMIZING,
    stages::FINALIZING,
];

/// A job accepted by the simulated client.
#[derive(Debug, Clone)]
struct SimulatedJob {
    source_name: String,
    target_format: String,
    current_stage: &'static str,
}

type JobMap = Arc<Mutex<HashMap<JobHandle, SimulatedJob>>>;

/// Conversion client that performs no network I/O.
#[derive(Debug, Clone)]
pub struct SimulatedClient {
    config: SimulatedConfig,
    jobs: JobMap,
}

/// Removes a job from the map when `await_result` ends, including when the
/// caller drops it mid-stage.
struct JobEntryGuard<'a> {
    jobs: &'a JobMap,
    handle: &'a JobHandle,
}

impl Drop for JobEntryGuard<'_> {
    fn drop(&mut self) {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(self.handle);
    }
}

impl Default for SimulatedClient {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

impl SimulatedClient {
    /// Creates a new simulated client.
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates a simulated client without stage delays.
    pub fn instant() -> Self {
        Self::new(SimulatedConfig::default().with_stage_delay(0))
    }

    /// Number of jobs submitted but not yet awaited to completion.
    pub fn pending_jobs(&self) -> usize {
        self.lock_jobs().len()
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, HashMap<JobHandle, SimulatedJob>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter_stage(
        &self,
        handle: &JobHandle,
        label: &'static str,
        stage_tx: &mpsc::Sender<String>,
    ) {
        if let Some(job) = self.lock_jobs().get_mut(handle) {
            job.current_stage = label;
        }
        debug!(handle = %handle, stage = label, "Simulated stage");
        report_stage(stage_tx, label).await;

        if self.config.stage_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.stage_delay_ms)).await;
        }
    }
}

/// Builds the output name for a converted file.
///
/// Replaces the text after the last `.` with `target_format`. Only a name
/// without any `.` keeps the whole name as its base, so `.bashrc` becomes
/// `.pdf`.
pub fn output_name(source_name: &str, target_format: &str) -> String {
    let base = match source_name.rsplit_once('.') {
        Some((base, _)) => base,
        None => source_name,
    };
    format!("{}.{}", base, target_format)
}

#[async_trait]
impl ConversionClient for SimulatedClient {
    fn name(&self) -> &str {
        "simulated"
    }

    fn stage_labels(&self) -> &[&'static str] {
        &STAGES
    }

    async fn submit(
        &self,
        _bytes: Vec<u8>,
        source_name: &str,
        target_format: &str,
        stage_tx: mpsc::Sender<String>,
    ) -> Result<JobHandle, ClientError> {
        let handle = JobHandle::new(Uuid::new_v4().to_string());
        self.lock_jobs().insert(
            handle.clone(),
            SimulatedJob {
                source_name: source_name.to_string(),
                target_format: target_format.to_string(),
                current_stage: STAGES[0],
            },
        );

        self.enter_stage(&handle, STAGES[0], &stage_tx).await;
        Ok(handle)
    }

    async fn await_result(
        &self,
        handle: &JobHandle,
        stage_tx: mpsc::Sender<String>,
    ) -> Result<ResultReference, ClientError> {
        let job = self
            .lock_jobs()
            .get(handle)
            .cloned()
            .ok_or_else(|| ClientError::conversion(format!("Unknown job: {}", handle)))?;
        let _entry = JobEntryGuard {
            jobs: &self.jobs,
            handle,
        };

        for &label in &STAGES[1..] {
            self.enter_stage(handle, label, &stage_tx).await;
        }
        Ok(ResultReference::new(output_name(
            &job.source_name,
            &job.target_format,
        )))
    }

    async fn describe_progress(&self, handle: &JobHandle) -> Option<String> {
        self.lock_jobs()
            .get(handle)
            .map(|job| job.current_stage.to_string())
    }
}
