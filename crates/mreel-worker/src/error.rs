//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] mreel_media::MediaError),

    #[error("Pose inference error: {0}")]
    Pose(#[from] mreel_pose::PoseError),

    #[error("Store error: {0}")]
    Store(#[from] mreel_store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] mreel_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }

    /// The human-readable text reported as the item message when this
    /// error ends a file's pipeline.
    pub fn item_message(&self) -> String {
        self.to_string()
    }
}
