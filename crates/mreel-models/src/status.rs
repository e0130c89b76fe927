//! Item and job status enums plus the aggregate status derivation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::JobItem;

/// Processing status of a single file within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting for a worker to pick the file up
    #[default]
    Queued,
    /// A worker is actively processing the file
    Processing,
    /// Highlights were compiled successfully
    Completed,
    /// Processing failed (or nothing worth compiling was found)
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }

    /// Check whether moving from `self` to `next` is a legal transition.
    ///
    /// Transitions are monotonic along queued -> processing -> terminal.
    /// Re-asserting the current status is always allowed.
    pub fn can_transition(&self, next: ItemStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            ItemStatus::Queued => true,
            ItemStatus::Processing => next.is_terminal(),
            ItemStatus::Completed | ItemStatus::Failed => false,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate status of a batch job, derived from its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derive the aggregate job status and message from the full item set.
///
/// The table is evaluated top to bottom and the first matching row wins:
/// empty, all completed, all settled with failures, any processing, only
/// queued remaining. Deterministic and total over any item multiset.
pub fn derive_batch_status(items: &[JobItem]) -> (JobStatus, String) {
    if items.is_empty() {
        return (JobStatus::Failed, "No files provided.".to_string());
    }

    let total = items.len();
    let completed = items
        .iter()
        .filter(|i| i.status == ItemStatus::Completed)
        .count();
    let failed = items
        .iter()
        .filter(|i| i.status == ItemStatus::Failed)
        .count();
    let processing = items
        .iter()
        .filter(|i| i.status == ItemStatus::Processing)
        .count();
    let queued = items
        .iter()
        .filter(|i| i.status == ItemStatus::Queued)
        .count();

    if completed == total {
        return (
            JobStatus::Completed,
            format!("All files completed ({completed}/{total})."),
        );
    }
    if failed > 0 && processing == 0 && queued == 0 {
        return (
            JobStatus::Failed,
            format!("{failed} file(s) failed ({completed}/{total} succeeded)."),
        );
    }
    if processing > 0 {
        return (
            JobStatus::Processing,
            format!("Processing {processing}/{total}. Completed {completed}."),
        );
    }
    (
        JobStatus::Queued,
        format!("Waiting to process {queued}/{total}."),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FileId, JobItem};

    fn item(status: ItemStatus) -> JobItem {
        let mut item = JobItem::new(FileId::new(), "clip.mp4");
        item.status = status;
        item
    }

    #[test]
    fn empty_batch_is_failed() {
        let (status, message) = derive_batch_status(&[]);
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(message, "No files provided.");
    }

    #[test]
    fn all_completed_wins_over_processing_row() {
        let items = vec![item(ItemStatus::Completed), item(ItemStatus::Completed)];
        let (status, message) = derive_batch_status(&items);
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(message, "All files completed (2/2).");
    }

    #[test]
    fn settled_batch_with_failures_is_failed() {
        let items = vec![item(ItemStatus::Completed), item(ItemStatus::Failed)];
        let (status, message) = derive_batch_status(&items);
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(message, "1 file(s) failed (1/2 succeeded).");
    }

    #[test]
    fn any_processing_item_keeps_job_processing() {
        let items = vec![item(ItemStatus::Completed), item(ItemStatus::Processing)];
        let (status, message) = derive_batch_status(&items);
        assert_eq!(status, JobStatus::Processing);
        assert_eq!(message, "Processing 1/2. Completed 1.");
    }

    #[test]
    fn failure_does_not_settle_job_while_work_remains() {
        let items = vec![
            item(ItemStatus::Failed),
            item(ItemStatus::Processing),
            item(ItemStatus::Queued),
        ];
        let (status, _) = derive_batch_status(&items);
        assert_eq!(status, JobStatus::Processing);
    }

    #[test]
    fn only_queued_items_keep_job_queued() {
        let items = vec![item(ItemStatus::Queued), item(ItemStatus::Queued)];
        let (status, message) = derive_batch_status(&items);
        assert_eq!(status, JobStatus::Queued);
        assert_eq!(message, "Waiting to process 2/2.");
    }

    #[test]
    fn terminal_states_do_not_transition() {
        assert!(!ItemStatus::Completed.can_transition(ItemStatus::Processing));
        assert!(!ItemStatus::Failed.can_transition(ItemStatus::Queued));
        assert!(ItemStatus::Failed.can_transition(ItemStatus::Failed));
        assert!(ItemStatus::Queued.can_transition(ItemStatus::Processing));
        assert!(ItemStatus::Processing.can_transition(ItemStatus::Failed));
    }
}
