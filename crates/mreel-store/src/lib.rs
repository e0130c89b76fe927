//! Durable batch-job store.
//!
//! One self-describing JSON document per job, shared by the API and every
//! worker. All updates are merge-patches applied through an atomic
//! read-modify-write so concurrent sibling tasks never lose each other's
//! writes; the aggregate job status is recomputed from the full item set
//! on every change.

pub mod error;
pub mod memory;
pub mod redis_store;
mod patch;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryJobStore;
pub use redis_store::{RedisJobStore, RedisStoreConfig};

use async_trait::async_trait;
use mreel_models::{FileId, ItemPatch, Job, JobId, JobPatch};

/// Shared store surface for batch jobs.
///
/// `update_item`/`update_job` are merge-patches: fields left `None` stay
/// untouched, and job status/message are always recomputed from the items
/// afterwards — callers can never set them directly.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a freshly created job. Fails with `AlreadyExists` if the
    /// job id is already taken.
    async fn create(&self, job: Job) -> StoreResult<Job>;

    /// Fetch a job snapshot.
    async fn get(&self, job_id: &JobId) -> StoreResult<Job>;

    /// Atomically patch one item and recompute the aggregate status.
    async fn update_item(
        &self,
        job_id: &JobId,
        file_id: &FileId,
        patch: ItemPatch,
    ) -> StoreResult<Job>;

    /// Atomically patch job-level fields. Replacing `items` wholesale
    /// recomputes the aggregate status the same way.
    async fn update_job(&self, job_id: &JobId, patch: JobPatch) -> StoreResult<Job>;
}
