//! Types for the client module.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage labels shared by the bundled clients.
pub mod stages {
    pub const UPLOADING: &str = "Uploading files...";
    pub const PROCESSING: &str = "Processing conversion...";
    pub const OPTIMIZING: &str = "Optimizing quality...";
    pub const FINALIZING: &str = "Finalizing output...";
}

/// Opaque handle to a job accepted by a conversion service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference (name or URL) that retrieves a converted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultReference(String);

impl ResultReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ResultReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
