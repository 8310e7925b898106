//! Testing utilities and mock implementations.
//!
//! This module provides a scriptable mock of the conversion client, a sink
//! that records progress events and input file fixtures, so batches can be
//! exercised without a network or real files.
//!
//! # Example
//!
//! ```rust,ignore
//! use converto_core::testing::{fixtures, MockClient, RecordingSink};
//!
//! let client = MockClient::new();
//! let sink = RecordingSink::new();
//!
//! let result = orchestrator.start(fixtures::files(&["a.mov", "b.wav"]), None, &sink).await?;
//!
//! assert_eq!(sink.events().last().unwrap().fraction, 1.0);
//! ```

mod mock_client;

pub use mock_client::{FailAt, MockClient, RecordedSubmission};

use async_trait::async_trait;
use std::io;
use std::sync::Mutex;

use crate::input::InputFile;
use crate::progress::{ProgressEvent, ProgressSink};

/// Progress sink that keeps every event it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

/// An input file whose contents can never be read.
#[derive(Debug, Clone)]
pub struct UnreadableFile {
    name: String,
}

impl UnreadableFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl InputFile for UnreadableFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn media_kind(&self) -> &str {
        ""
    }

    fn byte_len(&self) -> u64 {
        0
    }

    async fn read(&self) -> io::Result<Vec<u8>> {
        Err(io::Error::new(io::ErrorKind::NotFound, "file vanished"))
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use crate::input::{media_kind_for_path, InputFile, MemoryFile};

    /// Create an in-memory file whose media kind is derived from its extension.
    pub fn memory_file(name: &str) -> Arc<dyn InputFile> {
        let kind = media_kind_for_path(std::path::Path::new(name));
        Arc::new(MemoryFile::new(name, kind, name.as_bytes().to_vec()))
    }

    /// Create an in-memory file with an explicit media kind.
    pub fn typed_file(name: &str, media_kind: &str) -> Arc<dyn InputFile> {
        Arc::new(MemoryFile::new(name, media_kind, name.as_bytes().to_vec()))
    }

    /// Create one in-memory file per name, in order.
    pub fn files(names: &[&str]) -> Vec<Arc<dyn InputFile>> {
        names.iter().map(|name| memory_file(name)).collect()
    }
}
