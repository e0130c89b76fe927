//! Patch application shared by every store backend.

use mreel_models::{FileId, ItemPatch, Job, JobPatch};

use crate::error::{StoreError, StoreResult};

/// Apply an item merge-patch and recompute the aggregate status.
pub(crate) fn apply_item_patch(
    job: &mut Job,
    file_id: &FileId,
    patch: &ItemPatch,
) -> StoreResult<()> {
    let job_id = job.job_id.clone();
    let item = job
        .item_mut(file_id)
        .ok_or_else(|| StoreError::item_not_found(job_id.as_str(), file_id.as_str()))?;
    item.apply(patch);
    job.recompute_status();
    Ok(())
}

/// Apply a job-level merge-patch and recompute the aggregate status when
/// the item set changed.
pub(crate) fn apply_job_patch(job: &mut Job, patch: &JobPatch) {
    if let Some(items) = &patch.items {
        job.items = items.clone();
        job.recompute_status();
    }
}
