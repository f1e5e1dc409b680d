use crate::error::{AppError, Result};

use super::Config;

/// Reject configurations the pipeline cannot run with.
pub fn validate(config: &Config) -> Result<()> {
    if config.api.key.trim().is_empty() {
        return Err(AppError::message("API key must not be empty"));
    }
    if config.api.base_url.trim().is_empty() {
        return Err(AppError::message("API base URL must not be empty"));
    }
    if config.api.retries == 0 {
        return Err(AppError::message("Retry count must be at least 1"));
    }
    if config.enrich.batch_size == 0 {
        return Err(AppError::message("Batch size must be at least 1"));
    }
    if config.pipeline.chunk_size == 0 {
        return Err(AppError::message("Chunk size must be at least 1"));
    }
    Ok(())
}
