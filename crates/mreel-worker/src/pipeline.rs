//! The per-file video pipeline collaborators.
//!
//! The orchestrator talks to the outside world (container normalization,
//! pose inference, encoding) only through this trait, so task logic can
//! be exercised without FFmpeg or the sidecar.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use mreel_media::{compile_highlights, prepare_video, probe_video, MediaError, PrepareOptions};
use mreel_models::ExtractionWindow;
use mreel_pose::{FrameAnalysis, PoseClient, SampleOptions};

use crate::error::WorkerResult;

/// External collaborators for one file's pipeline.
#[async_trait]
pub trait VideoPipeline: Send + Sync {
    /// Normalize an upload into a decodable container.
    async fn prepare(
        &self,
        input: &Path,
        processing_dir: &Path,
        file_id: &str,
    ) -> WorkerResult<PathBuf>;

    /// Produce the per-frame presence/movement signal for a prepared video.
    async fn analyze(&self, video: &Path) -> WorkerResult<FrameAnalysis>;

    /// Cut the given windows, in order, into one concatenated output.
    /// Returns `None` when there is nothing to compile.
    async fn compile(
        &self,
        source: &Path,
        windows: &[ExtractionWindow],
        output: &Path,
    ) -> WorkerResult<Option<PathBuf>>;
}

/// Production pipeline: FFmpeg for containers, the pose sidecar for
/// frame signals.
pub struct FfmpegPipeline {
    pose: PoseClient,
    prepare_options: PrepareOptions,
    sample: SampleOptions,
}

impl FfmpegPipeline {
    pub fn new(pose: PoseClient, prepare_options: PrepareOptions) -> Self {
        Self {
            pose,
            prepare_options,
            sample: SampleOptions::default(),
        }
    }
}

#[async_trait]
impl VideoPipeline for FfmpegPipeline {
    async fn prepare(
        &self,
        input: &Path,
        processing_dir: &Path,
        file_id: &str,
    ) -> WorkerResult<PathBuf> {
        let prepared = prepare_video(input, processing_dir, file_id, &self.prepare_options).await?;

        // Reject inputs we cannot place on a timeline before spending
        // minutes on inference
        let info = probe_video(&prepared).await?;
        if info.fps <= 0.0 {
            return Err(MediaError::invalid_video("Unable to read FPS from video.").into());
        }

        Ok(prepared)
    }

    async fn analyze(&self, video: &Path) -> WorkerResult<FrameAnalysis> {
        Ok(self.pose.analyze(video, &self.sample).await?)
    }

    async fn compile(
        &self,
        source: &Path,
        windows: &[ExtractionWindow],
        output: &Path,
    ) -> WorkerResult<Option<PathBuf>> {
        Ok(compile_highlights(source, windows, output).await?)
    }
}
