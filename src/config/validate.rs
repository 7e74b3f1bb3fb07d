// src/config/validate.rs

use crate::config::model::{RawRunConfig, RetrySection, RunConfig, RunSection};
use crate::errors::{GrowdagError, Result};

impl TryFrom<RawRunConfig> for RunConfig {
    type Error = GrowdagError;

    fn try_from(raw: RawRunConfig) -> std::result::Result<Self, Self::Error> {
        validate_run_section(&raw.run)?;
        validate_retry_section(&raw.retry)?;
        Ok(RunConfig::new_unchecked(raw.run, raw.retry))
    }
}

fn validate_run_section(run: &RunSection) -> Result<()> {
    if run.poll_interval_ms == 0 {
        return Err(GrowdagError::ConfigError(
            "[run].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if run.poll_timeout_ms == 0 {
        return Err(GrowdagError::ConfigError(
            "[run].poll_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if run.max_iterations == Some(0) {
        return Err(GrowdagError::ConfigError(
            "[run].max_iterations must be >= 1 when set (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_retry_section(retry: &RetrySection) -> Result<()> {
    if retry.submit_attempts == 0 {
        return Err(GrowdagError::ConfigError(
            "[retry].submit_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
