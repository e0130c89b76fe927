//! Per-file task orchestration.
//!
//! Drives one uploaded file through prepare -> detect -> plan -> compile,
//! reporting every phase to the job store. All pipeline failures are
//! absorbed here and rendered as the item's terminal status; only
//! infrastructure failures (store unreachable before the task has begun)
//! propagate so the queue can redeliver.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{error, info, warn};

use mreel_media::{detect_segments, plan_windows};
use mreel_models::{ItemPatch, ItemStatus, JobId};
use mreel_queue::ProcessFileJob;
use mreel_store::{JobStore, StoreError};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::pipeline::VideoPipeline;

/// Everything a file task needs: configuration, the shared store, and the
/// pipeline collaborators.
pub struct TaskContext {
    pub config: WorkerConfig,
    pub store: Arc<dyn JobStore>,
    pub pipeline: Arc<dyn VideoPipeline>,
}

impl TaskContext {
    fn job_upload_dir(&self, job_id: &JobId) -> PathBuf {
        self.config.upload_dir.join(job_id.as_str())
    }

    fn job_processing_dir(&self, job_id: &JobId) -> PathBuf {
        self.config.processing_dir.join(job_id.as_str())
    }

    fn job_download_dir(&self, job_id: &JobId) -> PathBuf {
        self.config.download_dir.join(job_id.as_str())
    }
}

/// Run one file's pipeline to a terminal item state.
///
/// Returns `Err` only when the store is unreachable before any processing
/// has started — the one case where redelivery is the right answer.
pub async fn run_file_task(ctx: &TaskContext, task: &ProcessFileJob) -> WorkerResult<()> {
    // A redelivered task whose item already settled is a no-op.
    match ctx.store.get(&task.job_id).await {
        Ok(job) => {
            if let Some(item) = job.item(&task.file_id) {
                if item.status.is_terminal() {
                    info!(
                        job_id = %task.job_id,
                        file_id = %task.file_id,
                        "Item already terminal, skipping redelivered task"
                    );
                    return Ok(());
                }
            } else {
                warn!(
                    job_id = %task.job_id,
                    file_id = %task.file_id,
                    "Task references a file missing from its job, skipping"
                );
                return Ok(());
            }
        }
        Err(StoreError::JobNotFound(_)) => {
            // Record expired; nothing left to report against
            warn!(job_id = %task.job_id, "Job record gone, dropping task");
            release_file_scratch(&task.upload_path, None).await;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    // The first status write must land; after it, the task owns the item
    // and every failure is reported through it.
    ctx.store
        .update_item(
            &task.job_id,
            &task.file_id,
            ItemPatch::status(ItemStatus::Processing).with_message("Preparing video..."),
        )
        .await?;

    let mut prepared_path: Option<PathBuf> = None;
    let result = process_file(ctx, task, &mut prepared_path).await;

    if let Err(e) = result {
        error!(
            job_id = %task.job_id,
            file_id = %task.file_id,
            "File task failed: {}",
            e
        );
        report(
            ctx,
            task,
            ItemPatch::status(ItemStatus::Failed).with_message(e.item_message()),
        )
        .await;
    }

    // Always release the raw upload and the prepared intermediate,
    // whatever happened above.
    release_file_scratch(&task.upload_path, prepared_path.as_deref()).await;

    // Whichever task finishes a job last removes its shared directories.
    finalize_job_dirs(ctx, &task.job_id).await;

    Ok(())
}

/// The pipeline proper. Expected negative outcomes (nothing detected,
/// nothing plannable) are terminal item states, not errors.
async fn process_file(
    ctx: &TaskContext,
    task: &ProcessFileJob,
    prepared_path: &mut Option<PathBuf>,
) -> WorkerResult<()> {
    let processing_dir = ctx.job_processing_dir(&task.job_id);

    let prepared = ctx
        .pipeline
        .prepare(&task.upload_path, &processing_dir, task.file_id.as_str())
        .await?;
    *prepared_path = Some(prepared.clone());

    report(ctx, task, ItemPatch::message("Detecting moving humans...")).await;

    let analysis = ctx.pipeline.analyze(&prepared).await?;
    let duration = analysis.duration();
    let segments = detect_segments(
        analysis.frames.iter().copied(),
        analysis.fps,
        duration,
        &ctx.config.detector,
    )?;

    if segments.is_empty() {
        report(
            ctx,
            task,
            ItemPatch::status(ItemStatus::Failed).with_message("No moving humans detected."),
        )
        .await;
        return Ok(());
    }

    report(
        ctx,
        task,
        ItemPatch::message(format!(
            "Found {} segments. Compiling...",
            segments.len()
        )),
    )
    .await;

    let windows = plan_windows(&segments, duration, &ctx.config.planner);
    if windows.is_empty() {
        report(
            ctx,
            task,
            ItemPatch::status(ItemStatus::Failed).with_message("Failed to compile video."),
        )
        .await;
        return Ok(());
    }

    let output = ctx
        .job_download_dir(&task.job_id)
        .join(format!("{}.mp4", task.file_id));

    match ctx.pipeline.compile(&prepared, &windows, &output).await? {
        Some(result_path) => {
            report(
                ctx,
                task,
                ItemPatch::status(ItemStatus::Completed)
                    .with_message("Processing complete!")
                    .with_download_url(format!(
                        "/api/download/{}/{}",
                        task.job_id, task.file_id
                    ))
                    .with_result_path(result_path.to_string_lossy()),
            )
            .await;
        }
        None => {
            report(
                ctx,
                task,
                ItemPatch::status(ItemStatus::Failed).with_message("Failed to compile video."),
            )
            .await;
        }
    }

    Ok(())
}

/// Write an item patch, logging (not propagating) store failures: by this
/// point the pipeline outcome is decided and a lost progress message must
/// not fail the task.
async fn report(ctx: &TaskContext, task: &ProcessFileJob, patch: ItemPatch) {
    if let Err(e) = ctx
        .store
        .update_item(&task.job_id, &task.file_id, patch)
        .await
    {
        warn!(
            job_id = %task.job_id,
            file_id = %task.file_id,
            "Failed to record item update: {}",
            e
        );
    }
}

/// Remove the raw upload and the prepared intermediate (when distinct).
/// Tolerates paths another step already removed.
async fn release_file_scratch(upload_path: &Path, prepared_path: Option<&Path>) {
    remove_file_quiet(upload_path).await;
    if let Some(prepared) = prepared_path {
        if prepared != upload_path {
            remove_file_quiet(prepared).await;
        }
    }
}

async fn remove_file_quiet(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// If every item of the job is terminal, remove the job-scoped upload and
/// processing directories. More than one finishing task may attempt this;
/// "already removed" is success.
async fn finalize_job_dirs(ctx: &TaskContext, job_id: &JobId) {
    let job = match ctx.store.get(job_id).await {
        Ok(job) => job,
        Err(e) => {
            warn!(job_id = %job_id, "Skipping job cleanup, cannot read job: {}", e);
            return;
        }
    };

    if !job.all_items_terminal() {
        return;
    }

    for dir in [ctx.job_upload_dir(job_id), ctx.job_processing_dir(job_id)] {
        match fs::remove_dir_all(&dir).await {
            Ok(()) => info!(job_id = %job_id, "Removed job directory {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", dir.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use mreel_models::{ExtractionWindow, FrameSignal, Job, JobItem, JobStatus};
    use mreel_pose::FrameAnalysis;
    use mreel_store::MemoryJobStore;

    use crate::error::WorkerError;

    /// Pipeline fake: drives the orchestrator without FFmpeg or the
    /// sidecar. Behavior is chosen per test through the fields.
    struct FakePipeline {
        frames: Vec<FrameSignal>,
        fps: f64,
        fail_prepare: Option<String>,
        compile_returns_none: bool,
    }

    impl FakePipeline {
        fn with_frames(frames: Vec<FrameSignal>, fps: f64) -> Self {
            Self {
                frames,
                fps,
                fail_prepare: None,
                compile_returns_none: false,
            }
        }

        /// Ten seconds of solid movement at 10 fps.
        fn moving() -> Self {
            Self::with_frames(vec![FrameSignal::moving(0.5); 100], 10.0)
        }

        /// Nothing but empty frames.
        fn empty_scene() -> Self {
            Self::with_frames(vec![FrameSignal::absent(); 100], 10.0)
        }
    }

    #[async_trait]
    impl VideoPipeline for FakePipeline {
        async fn prepare(
            &self,
            input: &Path,
            processing_dir: &Path,
            file_id: &str,
        ) -> WorkerResult<PathBuf> {
            if let Some(message) = &self.fail_prepare {
                return Err(WorkerError::task_failed(message.clone()));
            }
            fs::create_dir_all(processing_dir).await?;
            let stem = input.file_stem().unwrap().to_string_lossy();
            let prepared = processing_dir.join(format!("{stem}_{file_id}.mp4"));
            fs::write(&prepared, b"prepared").await?;
            Ok(prepared)
        }

        async fn analyze(&self, _video: &Path) -> WorkerResult<FrameAnalysis> {
            Ok(FrameAnalysis {
                fps: self.fps,
                frame_count: self.frames.len(),
                frames: self.frames.clone(),
            })
        }

        async fn compile(
            &self,
            _source: &Path,
            windows: &[ExtractionWindow],
            output: &Path,
        ) -> WorkerResult<Option<PathBuf>> {
            if self.compile_returns_none || windows.is_empty() {
                return Ok(None);
            }
            fs::create_dir_all(output.parent().unwrap()).await?;
            fs::write(output, b"compiled").await?;
            Ok(Some(output.to_path_buf()))
        }
    }

    struct Harness {
        _root: TempDir,
        ctx: TaskContext,
    }

    impl Harness {
        fn new(pipeline: FakePipeline) -> Self {
            let root = TempDir::new().unwrap();
            let config = WorkerConfig {
                upload_dir: root.path().join("uploads"),
                processing_dir: root.path().join("processing"),
                download_dir: root.path().join("downloads"),
                ..WorkerConfig::default()
            };
            Self {
                _root: root,
                ctx: TaskContext {
                    config,
                    store: Arc::new(MemoryJobStore::new()),
                    pipeline: Arc::new(pipeline),
                },
            }
        }

        /// Create a job with one queued item per filename and write the
        /// matching upload files to disk.
        async fn seed_job(&self, filenames: &[&str]) -> (JobId, Vec<ProcessFileJob>) {
            let job_id = JobId::new();
            let mut items = Vec::new();
            let mut tasks = Vec::new();

            let upload_dir = self.ctx.job_upload_dir(&job_id);
            fs::create_dir_all(&upload_dir).await.unwrap();
            fs::create_dir_all(self.ctx.job_processing_dir(&job_id))
                .await
                .unwrap();

            for filename in filenames {
                let item = JobItem::new(mreel_models::FileId::new(), *filename);
                let upload_path =
                    upload_dir.join(format!("{}_{}", item.file_id, filename));
                fs::write(&upload_path, b"raw upload").await.unwrap();
                tasks.push(ProcessFileJob::new(
                    job_id.clone(),
                    item.file_id.clone(),
                    upload_path,
                    *filename,
                ));
                items.push(item);
            }

            self.ctx
                .store
                .create(Job::new(job_id.clone(), items))
                .await
                .unwrap();
            (job_id, tasks)
        }
    }

    #[tokio::test]
    async fn successful_task_completes_item_and_cleans_up() {
        let harness = Harness::new(FakePipeline::moving());
        let (job_id, tasks) = harness.seed_job(&["dance.mov"]).await;

        run_file_task(&harness.ctx, &tasks[0]).await.unwrap();

        let job = harness.ctx.store.get(&job_id).await.unwrap();
        let item = job.item(&tasks[0].file_id).unwrap();
        assert_eq!(item.status, ItemStatus::Completed);
        assert_eq!(item.message, "Processing complete!");
        assert_eq!(
            item.download_url.as_deref(),
            Some(format!("/api/download/{}/{}", job_id, tasks[0].file_id).as_str())
        );
        assert!(item.result_path.is_some());
        assert_eq!(job.status, JobStatus::Completed);

        // Raw upload released, job-scoped directories removed
        assert!(!tasks[0].upload_path.exists());
        assert!(!harness.ctx.job_upload_dir(&job_id).exists());
        assert!(!harness.ctx.job_processing_dir(&job_id).exists());
        // The compiled result survives cleanup
        assert!(harness.ctx.job_download_dir(&job_id).exists());
    }

    #[tokio::test]
    async fn empty_scene_fails_item_with_detection_message() {
        let harness = Harness::new(FakePipeline::empty_scene());
        let (job_id, tasks) = harness.seed_job(&["still.mp4"]).await;

        run_file_task(&harness.ctx, &tasks[0]).await.unwrap();

        let job = harness.ctx.store.get(&job_id).await.unwrap();
        let item = job.item(&tasks[0].file_id).unwrap();
        assert_eq!(item.status, ItemStatus::Failed);
        assert_eq!(item.message, "No moving humans detected.");
        assert!(!tasks[0].upload_path.exists());
    }

    #[tokio::test]
    async fn collaborator_failure_surfaces_its_error_text() {
        let pipeline = FakePipeline {
            fail_prepare: Some("moov atom not found".to_string()),
            ..FakePipeline::moving()
        };
        let harness = Harness::new(pipeline);
        let (job_id, tasks) = harness.seed_job(&["broken.avi"]).await;

        run_file_task(&harness.ctx, &tasks[0]).await.unwrap();

        let job = harness.ctx.store.get(&job_id).await.unwrap();
        let item = job.item(&tasks[0].file_id).unwrap();
        assert_eq!(item.status, ItemStatus::Failed);
        assert!(item.message.contains("moov atom not found"));
    }

    #[tokio::test]
    async fn compile_returning_none_fails_item() {
        let pipeline = FakePipeline {
            compile_returns_none: true,
            ..FakePipeline::moving()
        };
        let harness = Harness::new(pipeline);
        let (job_id, tasks) = harness.seed_job(&["clip.mp4"]).await;

        run_file_task(&harness.ctx, &tasks[0]).await.unwrap();

        let job = harness.ctx.store.get(&job_id).await.unwrap();
        assert_eq!(
            job.item(&tasks[0].file_id).unwrap().message,
            "Failed to compile video."
        );
    }

    #[tokio::test]
    async fn one_failure_never_touches_siblings() {
        // Shared pipeline would succeed for both; fail the first file by
        // deleting its upload is not enough for the fake, so run one task
        // against a failing pipeline and its sibling against a good one,
        // over the same store and directories.
        let harness = Harness::new(FakePipeline::moving());
        let (job_id, tasks) = harness.seed_job(&["good.mp4", "bad.mp4"]).await;

        let failing = TaskContext {
            config: harness.ctx.config.clone(),
            store: Arc::clone(&harness.ctx.store),
            pipeline: Arc::new(FakePipeline {
                fail_prepare: Some("unreadable container".to_string()),
                ..FakePipeline::moving()
            }),
        };

        run_file_task(&harness.ctx, &tasks[0]).await.unwrap();
        run_file_task(&failing, &tasks[1]).await.unwrap();

        let job = harness.ctx.store.get(&job_id).await.unwrap();
        assert_eq!(
            job.item(&tasks[0].file_id).unwrap().status,
            ItemStatus::Completed
        );
        assert_eq!(
            job.item(&tasks[1].file_id).unwrap().status,
            ItemStatus::Failed
        );
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "1 file(s) failed (1/2 succeeded).");

        // Both terminal: the last finisher removed the shared directories
        assert!(!harness.ctx.job_upload_dir(&job_id).exists());
        assert!(!harness.ctx.job_processing_dir(&job_id).exists());
    }

    #[tokio::test]
    async fn redelivered_task_for_terminal_item_is_a_no_op() {
        let harness = Harness::new(FakePipeline::moving());
        let (job_id, tasks) = harness.seed_job(&["clip.mp4"]).await;

        run_file_task(&harness.ctx, &tasks[0]).await.unwrap();
        let version_after_first = harness.ctx.store.get(&job_id).await.unwrap().version;

        run_file_task(&harness.ctx, &tasks[0]).await.unwrap();
        let job = harness.ctx.store.get(&job_id).await.unwrap();
        assert_eq!(job.version, version_after_first, "redelivery wrote to the store");
        assert_eq!(job.item(&tasks[0].file_id).unwrap().status, ItemStatus::Completed);
    }

    #[tokio::test]
    async fn job_cleanup_tolerates_already_removed_directories() {
        let harness = Harness::new(FakePipeline::moving());
        let (job_id, tasks) = harness.seed_job(&["clip.mp4"]).await;

        // Remove the shared directories before the task finalizes
        fs::remove_dir_all(harness.ctx.job_upload_dir(&job_id))
            .await
            .unwrap();
        fs::remove_dir_all(harness.ctx.job_processing_dir(&job_id))
            .await
            .unwrap();

        run_file_task(&harness.ctx, &tasks[0]).await.unwrap();

        let job = harness.ctx.store.get(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }
}
