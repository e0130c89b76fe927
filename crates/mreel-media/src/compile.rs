//! Highlight compilation: cut extraction windows and concatenate them.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use mreel_models::ExtractionWindow;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Cut each extraction window from `source` and concatenate the cuts, in
/// order, into `output`.
///
/// Returns `Ok(None)` when there are no windows to compile. Each window is
/// re-encoded so cut points land exactly where the planner put them
/// (stream-copy would snap to the nearest keyframe); the final
/// concatenation is a stream copy over the already-uniform cuts.
pub async fn compile_highlights(
    source: impl AsRef<Path>,
    windows: &[ExtractionWindow],
    output: impl AsRef<Path>,
) -> MediaResult<Option<PathBuf>> {
    let source = source.as_ref();
    let output = output.as_ref();

    if windows.is_empty() {
        return Ok(None);
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).await?;
    }

    let scratch = tempfile::tempdir()?;
    let runner = FfmpegRunner::new();

    let mut cut_paths = Vec::with_capacity(windows.len());
    for (idx, window) in windows.iter().enumerate() {
        let cut_path = scratch.path().join(format!("cut_{idx:04}.mp4"));

        let cmd = FfmpegCommand::new(source, &cut_path)
            .seek(window.start)
            .duration(window.duration())
            .video_codec("libx264")
            .pixel_format("yuv420p")
            .preset("veryfast")
            .audio_codec("aac")
            .output_args(["-movflags", "+faststart"]);

        runner.run(&cmd).await?;
        cut_paths.push(cut_path);
    }

    // Concat demuxer list: one entry per cut, in window order
    let list_path = scratch.path().join("concat.txt");
    let list_body: String = cut_paths.iter().map(|p| concat_entry(p)).collect();
    fs::write(&list_path, list_body).await?;

    let concat_cmd = FfmpegCommand::new(&list_path, output)
        .input_args(["-f", "concat", "-safe", "0"])
        .codec_copy();
    runner.run(&concat_cmd).await?;

    info!(
        "Compiled {} window(s) from {} into {}",
        windows.len(),
        source.display(),
        output.display()
    );

    Ok(Some(output.to_path_buf()))
}

/// Format one concat-demuxer list entry, escaping single quotes.
fn concat_entry(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{escaped}'\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_window_list_compiles_nothing() {
        let result = compile_highlights("in.mp4", &[], "out.mp4").await.unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn concat_entry_escapes_quotes() {
        let entry = concat_entry(Path::new("/tmp/it's a clip.mp4"));
        assert_eq!(entry, "file '/tmp/it'\\''s a clip.mp4'\n");
    }
}
