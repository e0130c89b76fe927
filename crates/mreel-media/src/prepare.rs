//! Container normalization: turn an arbitrary upload into a decodable MP4.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Optional downscaling applied while normalizing.
///
/// Non-positive values mean "keep the source".
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// Output height; width follows to preserve aspect ratio.
    pub target_height: Option<u32>,
    /// Output frame rate.
    pub target_fps: Option<f64>,
}

impl PrepareOptions {
    /// Create options from environment variables.
    pub fn from_env() -> Self {
        Self {
            target_height: std::env::var("PREPARE_TARGET_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok()),
            target_fps: std::env::var("PREPARE_TARGET_FPS")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
        .normalized()
    }

    /// Drop non-positive values.
    fn normalized(mut self) -> Self {
        if self.target_height.is_some_and(|h| h == 0) {
            self.target_height = None;
        }
        if self.target_fps.is_some_and(|f| f <= 0.0) {
            self.target_fps = None;
        }
        self
    }
}

/// Ensure an input video is a decodable MP4, transcoding when needed.
///
/// Inputs that are already MP4 (and need no downscaling) pass through
/// untouched; everything else is transcoded into `processing_dir` with a
/// name carrying `file_id` so parallel tasks in the same job never collide.
pub async fn prepare_video(
    input: impl AsRef<Path>,
    processing_dir: impl AsRef<Path>,
    file_id: &str,
    options: &PrepareOptions,
) -> MediaResult<PathBuf> {
    let input = input.as_ref();
    let processing_dir = processing_dir.as_ref();
    let options = options.clone().normalized();

    fs::create_dir_all(processing_dir).await?;

    let is_mp4 = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mp4"))
        .unwrap_or(false);
    let needs_transcode =
        !is_mp4 || options.target_height.is_some() || options.target_fps.is_some();

    if !needs_transcode {
        return Ok(input.to_path_buf());
    }

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    let output = processing_dir.join(format!("{stem}_{file_id}.mp4"));

    info!(
        "Transcoding {} -> {}",
        input.display(),
        output.display()
    );

    let mut filters = Vec::new();
    if let Some(height) = options.target_height {
        // Preserve aspect; encoders need even dimensions
        let even_height = if height % 2 == 0 {
            height
        } else {
            (height - 1).max(2)
        };
        filters.push(format!("scale=-2:{even_height}"));
    } else {
        filters.push("scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string());
    }
    if let Some(fps) = options.target_fps {
        filters.push(format!("fps={fps}"));
    }

    let cmd = FfmpegCommand::new(input, &output)
        .input_args(["-analyzeduration", "100M", "-probesize", "100M"])
        .output_args(["-ignore_unknown", "-map", "0:v:0", "-map", "0:a:0?"])
        .video_codec("libx264")
        .pixel_format("yuv420p")
        .video_filter(filters.join(","))
        .audio_codec("aac")
        .output_args(["-movflags", "+faststart"]);

    FfmpegRunner::new().run(&cmd).await?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mp4_without_downscale_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        fs::write(&input, b"not really a video").await.unwrap();

        let prepared = prepare_video(&input, dir.path().join("work"), "f1", &PrepareOptions::default())
            .await
            .unwrap();
        assert_eq!(prepared, input);
    }

    #[test]
    fn non_positive_targets_are_dropped() {
        let options = PrepareOptions {
            target_height: Some(0),
            target_fps: Some(-1.0),
        }
        .normalized();
        assert!(options.target_height.is_none());
        assert!(options.target_fps.is_none());
    }
}
