//! Pose client error types.

use thiserror::Error;

pub type PoseResult<T> = Result<T, PoseError>;

#[derive(Debug, Error)]
pub enum PoseError {
    #[error("Pose service request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Pose service returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Pose service unreachable: {0}")]
    Network(#[from] reqwest::Error),
}

impl PoseError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}
