//! Trait definitions for the client module.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::ClientError;
use super::types::{JobHandle, ResultReference};

/// A client for an external conversion service.
///
/// Implementations report the label of each stage they enter on the `stage_tx`
/// channel. A closed channel must not fail the job.
#[async_trait]
pub trait ConversionClient: Send + Sync {
    /// Returns the name of this client implementation.
    fn name(&self) -> &str;

    /// Ordered labels of the stages this client reports for every job.
    ///
    /// The number of labels is the per-job share of the combined progress bar.
    fn stage_labels(&self) -> &[&'static str];

    /// Submits the file contents for conversion to `target_format`.
    async fn submit(
        &self,
        bytes: Vec<u8>,
        source_name: &str,
        target_format: &str,
        stage_tx: mpsc::Sender<String>,
    ) -> Result<JobHandle, ClientError>;

    /// Waits for a submitted job to finish and returns its result reference.
    async fn await_result(
        &self,
        handle: &JobHandle,
        stage_tx: mpsc::Sender<String>,
    ) -> Result<ResultReference, ClientError>;

    /// Describes the current stage of a job, for display only.
    async fn describe_progress(&self, _handle: &JobHandle) -> Option<String> {
        None
    }
}

/// Sends a stage label, ignoring a closed receiver.
pub(crate) async fn report_stage(stage_tx: &mpsc::Sender<String>, label: &str) {
    let _ = stage_tx.send(label.to_string()).await;
}
