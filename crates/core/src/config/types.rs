use serde::{Deserialize, Serialize};

use crate::client::{CloudConvertConfig, SimulatedConfig};
use crate::sequencer::SequencerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub simulated: SimulatedConfig,
    #[serde(default)]
    pub cloudconvert: Option<CloudConvertConfig>,
    #[serde(default)]
    pub sequencer: SequencerConfig,
}

/// Conversion client selection
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub backend: ClientBackend,
}

/// Available conversion backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientBackend {
    /// Timed simulation, no network.
    #[default]
    Simulated,
    /// CloudConvert API v2.
    #[serde(rename = "cloudconvert")]
    CloudConvert,
}

impl ClientBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientBackend::Simulated => "simulated",
            ClientBackend::CloudConvert => "cloudconvert",
        }
    }
}

/// Sanitized config for display (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub backend: String,
    pub simulated: SimulatedConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudconvert: Option<SanitizedCloudConvertConfig>,
    pub sequencer: SequencerConfig,
}

/// Sanitized CloudConvert config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCloudConvertConfig {
    pub api_url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            backend: config.client.backend.as_str().to_string(),
            simulated: config.simulated.clone(),
            cloudconvert: config
                .cloudconvert
                .as_ref()
                .map(|cc| SanitizedCloudConvertConfig {
                    api_url: cc.api_url.clone(),
                    api_key_configured: !cc.api_key.is_empty(),
                    timeout_secs: cc.timeout_secs,
                    poll_interval_ms: cc.poll_interval_ms,
                }),
            sequencer: config.sequencer.clone(),
        }
    }
}
