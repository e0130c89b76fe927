//! Batch job and per-file item records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::status::{derive_batch_status, ItemStatus, JobStatus};

/// Unique identifier for a batch job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for one uploaded file within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    /// Generate a new random file ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One file's processing record within a batch job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobItem {
    /// Unique file ID within the job
    pub file_id: FileId,
    /// Original upload filename
    pub filename: String,
    /// Current processing status
    #[serde(default)]
    pub status: ItemStatus,
    /// Human-readable progress/outcome message
    #[serde(default)]
    pub message: String,
    /// Download URL, set once the item completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Storage location of the compiled highlights file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
}

impl JobItem {
    /// Create a new queued item.
    pub fn new(file_id: FileId, filename: impl Into<String>) -> Self {
        Self {
            file_id,
            filename: filename.into(),
            status: ItemStatus::Queued,
            message: "Queued".to_string(),
            download_url: None,
            result_path: None,
        }
    }

    /// Apply a merge-patch: fields left as `None` stay untouched.
    ///
    /// A status change out of a terminal state is dropped (the rest of the
    /// patch still applies), keeping item transitions monotonic.
    pub fn apply(&mut self, patch: &ItemPatch) {
        if let Some(status) = patch.status {
            if self.status.can_transition(status) {
                self.status = status;
            } else {
                tracing::warn!(
                    file_id = %self.file_id,
                    from = %self.status,
                    to = %status,
                    "Ignoring illegal item status transition"
                );
            }
        }
        if let Some(message) = &patch.message {
            self.message = message.clone();
        }
        if let Some(url) = &patch.download_url {
            self.download_url = Some(url.clone());
        }
        if let Some(path) = &patch.result_path {
            self.result_path = Some(path.clone());
        }
    }
}

/// Partial update for a single item. `None` means "leave untouched".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemPatch {
    pub status: Option<ItemStatus>,
    pub message: Option<String>,
    pub download_url: Option<String>,
    pub result_path: Option<String>,
}

impl ItemPatch {
    /// Patch that only changes the status.
    pub fn status(status: ItemStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch that only changes the message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    pub fn with_result_path(mut self, path: impl Into<String>) -> Self {
        self.result_path = Some(path.into());
        self
    }
}

/// Partial update for job-level fields. `None` means "leave untouched".
///
/// Replacing `items` wholesale triggers the same status/message
/// recomputation as an item-level patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPatch {
    pub items: Option<Vec<JobItem>>,
}

/// A batch job aggregate: one record per upload request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub job_id: JobId,
    /// Aggregate status, derived from items
    #[serde(default)]
    pub status: JobStatus,
    /// Aggregate message, derived from items
    #[serde(default)]
    pub message: String,
    /// Per-file records, in upload order
    pub items: Vec<JobItem>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by every store write
    #[serde(default)]
    pub version: u64,
}

impl Job {
    /// Create a new job with the given items; status/message are derived.
    pub fn new(job_id: JobId, items: Vec<JobItem>) -> Self {
        let (status, message) = derive_batch_status(&items);
        Self {
            job_id,
            status,
            message,
            items,
            created_at: Utc::now(),
            version: 0,
        }
    }

    /// Look up an item by file ID.
    pub fn item(&self, file_id: &FileId) -> Option<&JobItem> {
        self.items.iter().find(|i| &i.file_id == file_id)
    }

    /// Look up an item mutably by file ID.
    pub fn item_mut(&mut self, file_id: &FileId) -> Option<&mut JobItem> {
        self.items.iter_mut().find(|i| &i.file_id == file_id)
    }

    /// True once every item has reached a terminal state.
    pub fn all_items_terminal(&self) -> bool {
        self.items.iter().all(|i| i.status.is_terminal())
    }

    /// Recompute the aggregate status/message from the current item set.
    pub fn recompute_status(&mut self) {
        let (status, message) = derive_batch_status(&self.items);
        self.status = status;
        self.message = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_derives_status_from_items() {
        let items = vec![
            JobItem::new(FileId::new(), "a.mp4"),
            JobItem::new(FileId::new(), "b.mov"),
        ];
        let job = Job::new(JobId::new(), items);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.message, "Waiting to process 2/2.");
        assert!(!job.all_items_terminal());
    }

    #[test]
    fn patch_merges_only_provided_fields() {
        let mut item = JobItem::new(FileId::new(), "a.mp4");
        item.apply(&ItemPatch::status(ItemStatus::Processing).with_message("Preparing video..."));
        assert_eq!(item.status, ItemStatus::Processing);
        assert_eq!(item.message, "Preparing video...");

        // Message-only patch leaves status and urls alone
        item.apply(&ItemPatch::message("Detecting moving humans..."));
        assert_eq!(item.status, ItemStatus::Processing);
        assert!(item.download_url.is_none());

        item.apply(
            &ItemPatch::status(ItemStatus::Completed)
                .with_message("Processing complete!")
                .with_download_url("/api/download/j/f")
                .with_result_path("/downloads/j/f.mp4"),
        );
        assert_eq!(item.status, ItemStatus::Completed);
        assert_eq!(item.download_url.as_deref(), Some("/api/download/j/f"));
        assert_eq!(item.result_path.as_deref(), Some("/downloads/j/f.mp4"));
    }

    #[test]
    fn patch_cannot_leave_terminal_state() {
        let mut item = JobItem::new(FileId::new(), "a.mp4");
        item.apply(&ItemPatch::status(ItemStatus::Failed).with_message("boom"));
        item.apply(&ItemPatch::status(ItemStatus::Processing).with_message("again"));
        assert_eq!(item.status, ItemStatus::Failed);
        // Non-status fields from the rejected patch still apply
        assert_eq!(item.message, "again");
    }

    #[test]
    fn job_serde_roundtrip() {
        let job = Job::new(
            JobId::from("job-1"),
            vec![JobItem::new(FileId::from("file-1"), "a.mp4")],
        );
        let json = serde_json::to_string(&job).expect("serialize Job");
        let decoded: Job = serde_json::from_str(&json).expect("deserialize Job");
        assert_eq!(decoded.job_id, job.job_id);
        assert_eq!(decoded.items.len(), 1);
        assert_eq!(decoded.status, JobStatus::Queued);
        assert_eq!(decoded.version, 0);
    }
}
