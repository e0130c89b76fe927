//! Task payload types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use mreel_models::{FileId, JobId};

/// Task to process one uploaded file within a batch job.
///
/// One of these is enqueued per file; siblings in the same batch are
/// independent and may run on different workers in any order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessFileJob {
    /// Batch job this file belongs to
    pub job_id: JobId,
    /// File within the batch
    pub file_id: FileId,
    /// Where the raw upload was written
    pub upload_path: PathBuf,
    /// Original upload filename
    pub filename: String,
    /// When the task was created
    pub created_at: DateTime<Utc>,
}

impl ProcessFileJob {
    /// Create a new per-file task.
    pub fn new(
        job_id: JobId,
        file_id: FileId,
        upload_path: impl Into<PathBuf>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            file_id,
            upload_path: upload_path.into(),
            filename: filename.into(),
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("process:{}:{}", self.job_id, self.file_id)
    }
}

/// Generic task wrapper for queue storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    /// Per-file task: prepare, detect, plan, compile one upload
    ProcessFile(ProcessFileJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::ProcessFile(j) => &j.job_id,
        }
    }

    pub fn file_id(&self) -> &FileId {
        match self {
            QueueJob::ProcessFile(j) => &j.file_id,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::ProcessFile(j) => j.idempotency_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_job_serde_roundtrip() {
        let job = ProcessFileJob::new(
            JobId::from("job-1"),
            FileId::from("file-1"),
            "/data/uploads/job-1/file-1_clip.mov",
            "clip.mov",
        );

        let wrapper = QueueJob::ProcessFile(job.clone());
        let json = serde_json::to_string(&wrapper).expect("serialize QueueJob");
        assert!(json.contains("\"type\":\"process_file\""));

        let decoded: QueueJob = serde_json::from_str(&json).expect("deserialize QueueJob");
        let QueueJob::ProcessFile(j) = decoded;
        assert_eq!(j.job_id, job.job_id);
        assert_eq!(j.file_id, job.file_id);
        assert_eq!(j.upload_path, job.upload_path);
        assert_eq!(j.filename, job.filename);
        assert_eq!(j.created_at, job.created_at);
    }

    #[test]
    fn idempotency_key_identifies_job_and_file() {
        let job = ProcessFileJob::new(
            JobId::from("j"),
            FileId::from("f"),
            "/tmp/upload.mp4",
            "upload.mp4",
        );
        assert_eq!(job.idempotency_key(), "process:j:f");
    }
}
