//! Tuning parameters for detection and planning.

use serde::{Deserialize, Serialize};

/// Parameters for the motion segment detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorParams {
    /// Minimum movement score for a frame to count as "moving".
    pub movement_threshold: f64,
    /// Consecutive moving frames required to open a segment.
    pub min_moving_frames: u32,
    /// Consecutive non-moving frames allowed before a segment closes.
    pub max_stationary_frames: u32,
    /// Segments closer than this many seconds are merged.
    pub merge_gap: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            movement_threshold: 0.02,
            min_moving_frames: 3,
            max_stationary_frames: 20,
            merge_gap: 1.0,
        }
    }
}

impl DetectorParams {
    /// Create params from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            movement_threshold: std::env::var("POSE_MOVEMENT_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.movement_threshold),
            min_moving_frames: std::env::var("MIN_MOVING_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_moving_frames),
            max_stationary_frames: std::env::var("MAX_STATIONARY_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_stationary_frames),
            merge_gap: std::env::var("SEGMENT_MERGE_GAP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.merge_gap),
        }
    }
}

/// Parameters for extraction-window planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerParams {
    /// Seconds of context to include before each segment start.
    pub buffer_before: f64,
    /// Seconds of context to include after each segment end.
    pub buffer_after: f64,
}

impl Default for PlannerParams {
    fn default() -> Self {
        Self {
            buffer_before: 2.0,
            buffer_after: 3.0,
        }
    }
}

impl PlannerParams {
    /// Create params from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            buffer_before: std::env::var("CLIP_BUFFER_BEFORE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.buffer_before),
            buffer_after: std::env::var("CLIP_BUFFER_AFTER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.buffer_after),
        }
    }
}
