//! Batch orchestrator, the entry point of the conversion core.
//!
//! The orchestrator turns a list of input files into a batch of jobs:
//! - **Planning**: each file gets the requested format, or the advisor's
//!   suggestion for its media kind when no format was requested
//! - **Running**: the batch is handed to the `JobSequencer`
//! - **Reporting**: one `BatchEntry` per file, in file order

mod runner;
mod types;

pub use runner::BatchOrchestrator;
pub use types::{BatchEntry, BatchError, BatchResult, PlannedJob};
