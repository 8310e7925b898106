//! Mock conversion client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::client::{
    output_name, stages, ClientError, ConversionClient, JobHandle, ResultReference,
};

/// Stage labels reported by the mock, one per client call.
const MOCK_STAGES: &[&str] = &[stages::UPLOADING, stages::PROCESSING];

/// Which client call a scripted failure happens in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Submit,
    Await,
}

/// A recorded submission for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSubmission {
    pub handle: JobHandle,
    pub source_name: String,
    pub target_format: String,
    pub byte_len: usize,
}

/// Mock implementation of the ConversionClient trait.
///
/// Behavior is scripted per source name:
/// - fail in `submit` or `await_result` with a given error
/// - delay `submit` or `await_result`
/// - override the result reference
///
/// Unscripted jobs succeed immediately with the same output name the
/// simulated client produces.
///
/// # Example
///
/// ```rust,ignore
/// use converto_core::testing::{FailAt, MockClient};
///
/// let client = MockClient::new();
/// client.fail_source("b.txt", FailAt::Submit, ClientError::submission("too large")).await;
///
/// // Run a batch...
///
/// assert_eq!(client.submission_count().await, 3);
/// ```
#[derive(Debug, Clone)]
pub struct MockClient {
    /// Recorded submissions, in call order.
    submissions: Arc<RwLock<Vec<RecordedSubmission>>>,
    /// Scripted failures by source name.
    failures: Arc<RwLock<HashMap<String, (FailAt, ClientError)>>>,
    /// Delays applied inside `submit` by source name.
    submit_delays: Arc<RwLock<HashMap<String, Duration>>>,
    /// Delays applied inside `await_result` by source name.
    await_delays: Arc<RwLock<HashMap<String, Duration>>>,
    /// Result reference overrides by source name.
    results: Arc<RwLock<HashMap<String, String>>>,
    /// Whether stage labels are sent at all.
    report_stages: Arc<RwLock<bool>>,
    next_handle: Arc<AtomicU64>,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    /// Create a new mock client where every job succeeds.
    pub fn new() -> Self {
        Self {
            submissions: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            submit_delays: Arc::new(RwLock::new(HashMap::new())),
            await_delays: Arc::new(RwLock::new(HashMap::new())),
            results: Arc::new(RwLock::new(HashMap::new())),
            report_stages: Arc::new(RwLock::new(true)),
            next_handle: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Get all recorded submissions.
    pub async fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.read().await.clone()
    }

    /// Get the number of submissions received.
    pub async fn submission_count(&self) -> usize {
        self.submissions.read().await.len()
    }

    /// Make the job for `source_name` fail at the given call.
    pub async fn fail_source(&self, source_name: &str, at: FailAt, error: ClientError) {
        self.failures
            .write()
            .await
            .insert(source_name.to_string(), (at, error));
    }

    /// Delay `submit` for `source_name`.
    pub async fn set_submit_delay(&self, source_name: &str, delay: Duration) {
        self.submit_delays
            .write()
            .await
            .insert(source_name.to_string(), delay);
    }

    /// Delay `await_result` for `source_name`.
    pub async fn set_await_delay(&self, source_name: &str, delay: Duration) {
        self.await_delays
            .write()
            .await
            .insert(source_name.to_string(), delay);
    }

    /// Return `reference` as the result for `source_name`.
    pub async fn set_result(&self, source_name: &str, reference: &str) {
        self.results
            .write()
            .await
            .insert(source_name.to_string(), reference.to_string());
    }

    /// Enable or disable stage reports.
    pub async fn set_report_stages(&self, enabled: bool) {
        *self.report_stages.write().await = enabled;
    }

    async fn report(&self, stage_tx: &mpsc::Sender<String>, label: &str) {
        if *self.report_stages.read().await {
            let _ = stage_tx.send(label.to_string()).await;
        }
    }

    async fn scripted_failure(&self, source_name: &str, at: FailAt) -> Option<ClientError> {
        match self.failures.read().await.get(source_name) {
            Some((fail_at, error)) if *fail_at == at => Some(error.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl ConversionClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    fn stage_labels(&self) -> &[&'static str] {
        MOCK_STAGES
    }

    async fn submit(
        &self,
        bytes: Vec<u8>,
        source_name: &str,
        target_format: &str,
        stage_tx: mpsc::Sender<String>,
    ) -> Result<JobHandle, ClientError> {
        self.report(&stage_tx, stages::UPLOADING).await;

        let delay = self.submit_delays.read().await.get(source_name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let handle = JobHandle::new(format!(
            "mock-{}",
            self.next_handle.fetch_add(1, Ordering::SeqCst)
        ));
        self.submissions.write().await.push(RecordedSubmission {
            handle: handle.clone(),
            source_name: source_name.to_string(),
            target_format: target_format.to_string(),
            byte_len: bytes.len(),
        });

        match self.scripted_failure(source_name, FailAt::Submit).await {
            Some(error) => Err(error),
            None => Ok(handle),
        }
    }

    async fn await_result(
        &self,
        handle: &JobHandle,
        stage_tx: mpsc::Sender<String>,
    ) -> Result<ResultReference, ClientError> {
        let submission = self
            .submissions
            .read()
            .await
            .iter()
            .find(|s| &s.handle == handle)
            .cloned()
            .ok_or_else(|| ClientError::conversion(format!("Unknown job handle: {}", handle)))?;

        self.report(&stage_tx, stages::PROCESSING).await;

        let delay = self
            .await_delays
            .read()
            .await
            .get(&submission.source_name)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self
            .scripted_failure(&submission.source_name, FailAt::Await)
            .await
        {
            return Err(error);
        }

        let reference = match self.results.read().await.get(&submission.source_name) {
            Some(reference) => reference.clone(),
            None => output_name(&submission.source_name, &submission.target_format),
        };
        Ok(ResultReference::new(reference))
    }
}
