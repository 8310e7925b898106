//! Terminal rendering of progress and results.

use std::sync::Arc;

use converto_core::{BatchResult, InputFile, JobOutcome, PlannedJob, ProgressEvent, ProgressSink};

/// Exit code when every file converted.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code when at least one file failed.
pub const EXIT_JOB_FAILED: i32 = 2;

/// Prints one line per progress event to stderr.
pub struct ProgressPrinter {
    names: Vec<String>,
}

impl ProgressPrinter {
    pub fn new(files: &[Arc<dyn InputFile>]) -> Self {
        Self {
            names: files.iter().map(|f| f.name().to_string()).collect(),
        }
    }

    fn line(&self, event: &ProgressEvent) -> String {
        let name = self
            .names
            .get(event.job_index)
            .map(String::as_str)
            .unwrap_or("?");
        format!(
            "[{:>3.0}%] {}: {}",
            event.fraction * 100.0,
            name,
            event.stage_label
        )
    }
}

impl ProgressSink for ProgressPrinter {
    fn on_progress(&self, event: &ProgressEvent) {
        eprintln!("{}", self.line(event));
    }
}

/// Formats the planned target formats as a table.
pub fn plan_table(plan: &[PlannedJob]) -> String {
    let width = name_width(plan.iter().map(|p| p.source_name.as_str()));
    let mut out = String::new();
    for job in plan {
        let origin = if job.requested { "requested" } else { "suggested" };
        out.push_str(&format!(
            "{:<width$}  {:<8}  -> {} ({})\n",
            job.source_name,
            job.category.as_str(),
            job.target_format,
            origin,
            width = width
        ));
    }
    out
}

/// Formats a finished batch as a table followed by a summary line.
pub fn result_table(result: &BatchResult) -> String {
    let width = name_width(result.entries.iter().map(|e| e.source_name.as_str()));
    let mut out = String::new();
    for entry in &result.entries {
        let line = match &entry.outcome {
            JobOutcome::Done { result_reference } => {
                format!("done    {}", result_reference)
            }
            JobOutcome::Failed { error } => format!("failed  {}", error),
        };
        out.push_str(&format!(
            "{:<width$}  {:<5}  {}\n",
            entry.source_name,
            entry.target_format,
            line,
            width = width
        ));
    }
    out.push_str(&format!(
        "{} converted, {} failed\n",
        result.succeeded().count(),
        result.failed().count()
    ));
    out
}

/// Process exit code for a finished batch.
pub fn exit_code(result: &BatchResult) -> i32 {
    if result.is_complete_success() {
        EXIT_SUCCESS
    } else {
        EXIT_JOB_FAILED
    }
}

fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(|n| n.chars().count()).max().unwrap_or(0)
}
