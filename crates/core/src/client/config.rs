//! Configuration for the conversion clients.

use serde::{Deserialize, Serialize};

/// Configuration for the simulated client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedConfig {
    /// Delay after entering each stage, in milliseconds.
    #[serde(default = "default_stage_delay")]
    pub stage_delay_ms: u64,
}

fn default_stage_delay() -> u64 {
    1500
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            stage_delay_ms: default_stage_delay(),
        }
    }
}

impl SimulatedConfig {
    /// Sets the per-stage delay.
    pub fn with_stage_delay(mut self, stage_delay_ms: u64) -> Self {
        self.stage_delay_ms = stage_delay_ms;
        self
    }
}

/// Configuration for the CloudConvert client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConvertConfig {
    /// API key, sent as a bearer token.
    pub api_key: String,

    /// API base URL (use `https://api.sandbox.cloudconvert.com` for the sandbox).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Maximum time to wait for a job to finish, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Interval between job status polls, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Timeout for a single HTTP request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.cloudconvert.com".to_string()
}

fn default_timeout() -> u64 {
    600 // 10 minutes
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_request_timeout() -> u64 {
    60
}

impl CloudConvertConfig {
    /// Creates a config with the given API key and defaults for the rest.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: default_api_url(),
            timeout_secs: default_timeout(),
            poll_interval_ms: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }

    /// Sets the API base URL.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Sets the job timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the poll interval in milliseconds.
    pub fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }
}
