//! Progress reporting.
//!
//! The sequencer reports every stage transition as a [`ProgressEvent`] to a
//! caller supplied [`ProgressSink`]. Events carry a combined fraction for the
//! whole batch and are delivered in file order: events of the lowest
//! unfinished job flow live, events of later jobs are held back until every
//! earlier job has finished.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::client::ClientError;

/// Label of the event closing a job that reported fewer stages than declared.
pub const DONE_LABEL: &str = "Done";

/// One progress update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Position of the job in the batch.
    pub job_index: usize,
    /// Human readable stage description.
    pub stage_label: String,
    /// Combined batch progress in `[0, 1]`.
    pub fraction: f64,
}

/// Receives progress events.
///
/// May be called from several jobs running concurrently, but never for two
/// events at the same time. Implementations must return quickly.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// Creates a sink together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, event: &ProgressEvent) {
        // Receiver gone means nobody is watching.
        let _ = self.tx.send(event.clone());
    }
}

#[derive(Debug)]
enum PendingEvent {
    Stage(String),
    Terminal(String),
}

#[derive(Debug, Default)]
struct JobProgress {
    reported: usize,
    finished: bool,
    pending: Vec<PendingEvent>,
}

#[derive(Debug)]
struct TrackerState {
    stages_per_job: usize,
    total: usize,
    completed: usize,
    head: usize,
    jobs: Vec<JobProgress>,
}

impl TrackerState {
    fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    fn emit(&mut self, index: usize, event: PendingEvent, sink: &dyn ProgressSink) {
        let stages_per_job = self.stages_per_job;
        let job = &mut self.jobs[index];
        let label = match event {
            PendingEvent::Stage(label) => {
                if job.reported < stages_per_job {
                    self.completed += 1;
                }
                job.reported += 1;
                label
            }
            PendingEvent::Terminal(label) => {
                self.completed += stages_per_job - job.reported.min(stages_per_job);
                job.reported = job.reported.max(stages_per_job);
                label
            }
        };

        sink.on_progress(&ProgressEvent {
            job_index: index,
            stage_label: label,
            fraction: self.fraction(),
        });
    }

    /// Emits everything the head job has queued, moving past finished jobs.
    fn drain(&mut self, sink: &dyn ProgressSink) {
        while self.head < self.jobs.len() {
            let head = self.head;
            let pending = std::mem::take(&mut self.jobs[head].pending);
            for event in pending {
                self.emit(head, event, sink);
            }
            if !self.jobs[head].finished {
                break;
            }
            self.head += 1;
        }
    }
}

/// Combined progress bar for one batch.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    state: Mutex<TrackerState>,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, job_count: usize, stages_per_job: usize) -> Self {
        Self {
            sink,
            state: Mutex::new(TrackerState {
                stages_per_job,
                total: job_count * stages_per_job,
                completed: 0,
                head: 0,
                jobs: (0..job_count).map(|_| JobProgress::default()).collect(),
            }),
        }
    }

    fn record(&self, index: usize, event: PendingEvent, finished: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(job) = state.jobs.get_mut(index) else {
            return;
        };
        if job.finished {
            return;
        }
        job.pending.push(event);
        job.finished = finished;
        state.drain(self.sink);
    }

    /// Records that job `index` entered the stage `label`.
    pub(crate) fn stage(&self, index: usize, label: impl Into<String>) {
        self.record(index, PendingEvent::Stage(label.into()), false);
    }

    /// Records that job `index` reached a terminal state.
    ///
    /// A failure always produces an event. A success only does when the job
    /// reported fewer stages than its share, so the bar still reaches 1.0.
    pub(crate) fn finish(&self, index: usize, error: Option<&ClientError>) {
        let label = match error {
            Some(error) => format!("Failed: {}", error),
            None => {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                let stages_per_job = state.stages_per_job;
                let Some(job) = state.jobs.get_mut(index) else {
                    return;
                };
                let queued = job
                    .pending
                    .iter()
                    .filter(|e| matches!(e, PendingEvent::Stage(_)))
                    .count();
                if job.reported + queued >= stages_per_job {
                    // Nothing left to account for, close the job silently.
                    job.finished = true;
                    state.drain(self.sink);
                    return;
                }
                DONE_LABEL.to_string()
            }
        };
        self.record(index, PendingEvent::Terminal(label), true);
    }
}
