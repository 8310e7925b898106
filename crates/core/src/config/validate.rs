use super::{
    types::{ClientBackend, Config},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - cloudconvert backend has a `[cloudconvert]` section with an API key
/// - sequencer limits are at least 1
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.client.backend == ClientBackend::CloudConvert {
        match &config.cloudconvert {
            None => {
                return Err(ConfigError::ValidationError(
                    "[cloudconvert] section is required for the cloudconvert backend".to_string(),
                ))
            }
            Some(cc) if cc.api_key.trim().is_empty() => {
                return Err(ConfigError::ValidationError(
                    "cloudconvert.api_key cannot be empty".to_string(),
                ))
            }
            Some(_) => {}
        }
    }

    if config.sequencer.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "sequencer.max_concurrent_jobs cannot be 0".to_string(),
        ));
    }

    if config.sequencer.job_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "sequencer.job_timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
