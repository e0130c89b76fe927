//! HTTP client for the pose-inference sidecar.

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use mreel_models::FrameSignal;

use crate::error::{PoseError, PoseResult};

/// Pose client configuration.
#[derive(Debug, Clone)]
pub struct PoseConfig {
    /// Base URL of the sidecar service
    pub base_url: String,
    /// Request timeout (inference over a long video takes a while)
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8500".to_string(),
            timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl PoseConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("POSE_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: Duration::from_secs(
                std::env::var("POSE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            connect_timeout: defaults.connect_timeout,
        }
    }
}

/// Frame sampling hints forwarded to the sidecar.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SampleOptions {
    /// Downscale frames to this height before inference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_height: Option<u32>,
    /// Decode at this frame rate instead of the container's
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_fps: Option<f64>,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    video_path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_fps: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    fps: f64,
    frame_count: usize,
    frames: Vec<FrameSignal>,
}

/// Per-frame analysis of one video: the ordered, exactly-once frame
/// signal sequence plus the timing metadata needed to place it.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    /// Native (or sampled) frame rate
    pub fps: f64,
    /// Number of decoded frames
    pub frame_count: usize,
    /// One signal per frame, in decode order
    pub frames: Vec<FrameSignal>,
}

impl FrameAnalysis {
    /// Video duration implied by the frame count.
    pub fn duration(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }
}

/// Client for the pose-inference sidecar service.
#[derive(Clone)]
pub struct PoseClient {
    http: Client,
    config: PoseConfig,
}

impl PoseClient {
    /// Create a new pose client.
    pub fn new(config: PoseConfig) -> PoseResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("mreel-pose/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> PoseResult<Self> {
        Self::new(PoseConfig::from_env())
    }

    /// Run pose inference over every frame of a prepared video.
    ///
    /// The sidecar shares a filesystem with the worker, so the video
    /// travels by path, not by upload.
    pub async fn analyze(
        &self,
        video_path: impl AsRef<Path>,
        sample: &SampleOptions,
    ) -> PoseResult<FrameAnalysis> {
        let video_path = video_path.as_ref().to_string_lossy().to_string();
        let url = format!("{}/v1/analyze", self.config.base_url);

        debug!("Requesting pose analysis for {}", video_path);

        let response = self
            .http
            .post(&url)
            .json(&AnalyzeRequest {
                video_path: &video_path,
                target_height: sample.target_height,
                target_fps: sample.target_fps,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PoseError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        let body: AnalyzeResponse = response.json().await?;

        if body.fps <= 0.0 {
            return Err(PoseError::invalid_response(format!(
                "non-positive frame rate {}",
                body.fps
            )));
        }
        if body.frames.len() != body.frame_count {
            return Err(PoseError::invalid_response(format!(
                "frame_count {} does not match {} returned signals",
                body.frame_count,
                body.frames.len()
            )));
        }

        Ok(FrameAnalysis {
            fps: body.fps,
            frame_count: body.frame_count,
            frames: body.frames,
        })
    }

    /// Check the sidecar is up.
    pub async fn healthcheck(&self) -> PoseResult<()> {
        let url = format!("{}/health", self.config.base_url);
        let response = self.http.get(&url).send().await?;

        if response.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(PoseError::RequestFailed {
                status: response.status().as_u16(),
                message: "healthcheck failed".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_response_parses_frame_signals() {
        let json = r#"{
            "fps": 30.0,
            "frame_count": 3,
            "frames": [
                {"present": false, "movement_score": null},
                {"present": true, "movement_score": null},
                {"present": true, "movement_score": 0.04}
            ]
        }"#;
        let body: AnalyzeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.frame_count, 3);
        assert!(!body.frames[0].present);
        assert!(body.frames[1].present);
        assert!(body.frames[1].movement_score.is_none());
        assert_eq!(body.frames[2].movement_score, Some(0.04));
    }

    #[test]
    fn duration_follows_frame_count() {
        let analysis = FrameAnalysis {
            fps: 10.0,
            frame_count: 200,
            frames: Vec::new(),
        };
        assert!((analysis.duration() - 20.0).abs() < 1e-9);
    }
}
