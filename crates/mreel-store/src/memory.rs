//! In-memory job store for tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use mreel_models::{FileId, ItemPatch, Job, JobId, JobPatch};

use crate::error::{StoreError, StoreResult};
use crate::patch::{apply_item_patch, apply_job_patch};
use crate::JobStore;

/// Job store over a mutex-guarded map.
///
/// The map lock is held only for the duration of a patch — never across a
/// blocking video operation — which makes every update an atomic
/// read-modify-write by construction.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: Job) -> StoreResult<Job> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(job.job_id.as_str()) {
            return Err(StoreError::AlreadyExists(job.job_id.to_string()));
        }
        jobs.insert(job.job_id.to_string(), job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: &JobId) -> StoreResult<Job> {
        let jobs = self.jobs.lock().await;
        jobs.get(job_id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))
    }

    async fn update_item(
        &self,
        job_id: &JobId,
        file_id: &FileId,
        patch: ItemPatch,
    ) -> StoreResult<Job> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(job_id.as_str())
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        apply_item_patch(job, file_id, &patch)?;
        job.version += 1;
        Ok(job.clone())
    }

    async fn update_job(&self, job_id: &JobId, patch: JobPatch) -> StoreResult<Job> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(job_id.as_str())
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        apply_job_patch(job, &patch);
        job.version += 1;
        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use mreel_models::{ItemStatus, JobItem, JobStatus};

    fn job_with_items(n: usize) -> (Job, Vec<FileId>) {
        let file_ids: Vec<FileId> = (0..n).map(|_| FileId::new()).collect();
        let items = file_ids
            .iter()
            .enumerate()
            .map(|(i, id)| JobItem::new(id.clone(), format!("clip_{i}.mp4")))
            .collect();
        (Job::new(JobId::new(), items), file_ids)
    }

    #[tokio::test]
    async fn create_rejects_duplicate_job_id() {
        let store = MemoryJobStore::new();
        let (job, _) = job_with_items(1);
        store.create(job.clone()).await.unwrap();
        let err = store.create(job).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn get_unknown_job_is_not_found() {
        let store = MemoryJobStore::new();
        let err = store.get(&JobId::from("missing")).await.unwrap_err();
        assert!(matches!(err, StoreError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn update_item_merges_and_recomputes_status() {
        let store = MemoryJobStore::new();
        let (job, file_ids) = job_with_items(2);
        let job_id = job.job_id.clone();
        store.create(job).await.unwrap();

        let updated = store
            .update_item(
                &job_id,
                &file_ids[0],
                ItemPatch::status(ItemStatus::Processing).with_message("Preparing video..."),
            )
            .await
            .unwrap();

        assert_eq!(updated.status, JobStatus::Processing);
        assert_eq!(updated.message, "Processing 1/2. Completed 0.");
        let item = updated.item(&file_ids[0]).unwrap();
        assert_eq!(item.message, "Preparing video...");
        // Sibling untouched
        assert_eq!(
            updated.item(&file_ids[1]).unwrap().status,
            ItemStatus::Queued
        );
    }

    #[tokio::test]
    async fn update_item_unknown_file_is_item_not_found() {
        let store = MemoryJobStore::new();
        let (job, _) = job_with_items(1);
        let job_id = job.job_id.clone();
        store.create(job).await.unwrap();

        let err = store
            .update_item(&job_id, &FileId::from("ghost"), ItemPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ItemNotFound { .. }));
    }

    #[tokio::test]
    async fn update_job_item_replacement_recomputes_status() {
        let store = MemoryJobStore::new();
        let (job, file_ids) = job_with_items(1);
        let job_id = job.job_id.clone();
        store.create(job).await.unwrap();

        let mut replacement = JobItem::new(file_ids[0].clone(), "clip_0.mp4");
        replacement.status = ItemStatus::Completed;
        let updated = store
            .update_job(
                &job_id,
                JobPatch {
                    items: Some(vec![replacement]),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, JobStatus::Completed);
        assert_eq!(updated.message, "All files completed (1/1).");
    }

    /// Concurrent sibling updates must not lose writes. N tasks patch N
    /// distinct items of one job; every patch must be visible in the
    /// final record.
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_item_updates_are_not_lost() {
        let store = Arc::new(MemoryJobStore::new());
        let (job, file_ids) = job_with_items(16);
        let job_id = job.job_id.clone();
        store.create(job).await.unwrap();

        let mut handles = Vec::new();
        for file_id in file_ids.clone() {
            let store = Arc::clone(&store);
            let job_id = job_id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_item(
                        &job_id,
                        &file_id,
                        ItemPatch::status(ItemStatus::Completed)
                            .with_message("Processing complete!"),
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let final_job = store.get(&job_id).await.unwrap();
        for file_id in &file_ids {
            assert_eq!(
                final_job.item(file_id).unwrap().status,
                ItemStatus::Completed,
                "lost update for {file_id}"
            );
        }
        assert_eq!(final_job.status, JobStatus::Completed);
        assert_eq!(final_job.message, "All files completed (16/16).");
        assert_eq!(final_job.version, 16);
    }
}
