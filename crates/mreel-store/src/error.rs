//! Store error types.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("File {file_id} not found in job {job_id}")]
    ItemNotFound { job_id: String, file_id: String },

    #[error("Concurrent update conflict on job {0} (retries exhausted)")]
    Conflict(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn item_not_found(job_id: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self::ItemNotFound {
            job_id: job_id.into(),
            file_id: file_id.into(),
        }
    }
}
