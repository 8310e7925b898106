//! Conversion client abstraction.
//!
//! This module provides the `ConversionClient` trait that the sequencer drives
//! for every job, plus two interchangeable implementations:
//!
//! - `SimulatedClient`: no network, fixed timed stages, fabricated results
//! - `CloudConvertClient`: the CloudConvert v2 REST API
//!
//! # Example
//!
//! ```ignore
//! use converto_core::client::{ConversionClient, SimulatedClient};
//! use tokio::sync::mpsc;
//!
//! let client = SimulatedClient::instant();
//! let (stage_tx, mut stage_rx) = mpsc::channel(16);
//!
//! let handle = client.submit(bytes, "movie.mov", "mp4", stage_tx.clone()).await?;
//! let reference = client.await_result(&handle, stage_tx).await?;
//! assert_eq!(reference.as_str(), "movie.mp4");
//! ```

mod cloudconvert;
mod config;
mod error;
mod simulated;
mod traits;
mod types;

use std::sync::Arc;

pub use cloudconvert::CloudConvertClient;
pub use config::{CloudConvertConfig, SimulatedConfig};
pub use error::ClientError;
pub use simulated::{output_name, SimulatedClient};
pub use traits::ConversionClient;
pub use types::{stages, JobHandle, ResultReference};

use crate::config::{ClientBackend, Config, ConfigError};

/// Factory function to create the configured conversion client.
pub fn create_client(config: &Config) -> Result<Arc<dyn ConversionClient>, ConfigError> {
    match config.client.backend {
        ClientBackend::Simulated => Ok(Arc::new(SimulatedClient::new(config.simulated.clone()))),
        ClientBackend::CloudConvert => {
            let cloudconvert = config.cloudconvert.clone().ok_or_else(|| {
                ConfigError::ValidationError(
                    "[cloudconvert] must be set when using the cloudconvert backend".to_string(),
                )
            })?;
            Ok(Arc::new(CloudConvertClient::new(cloudconvert)))
        }
    }
}
