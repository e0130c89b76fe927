//! Timeline primitives shared between detection, planning, and compilation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-frame observation from the pose-inference service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSignal {
    /// Whether a human pose was detected in the frame
    pub present: bool,
    /// Mean landmark displacement against the previous frame.
    ///
    /// `None` whenever no displacement is computable: the first present
    /// frame, and any frame following an absent frame.
    #[serde(default)]
    pub movement_score: Option<f64>,
}

impl FrameSignal {
    /// A frame with no detected pose.
    pub fn absent() -> Self {
        Self {
            present: false,
            movement_score: None,
        }
    }

    /// A present frame with a movement score.
    pub fn moving(score: f64) -> Self {
        Self {
            present: true,
            movement_score: Some(score),
        }
    }

    /// A present frame with no computable score (first sighting).
    pub fn still() -> Self {
        Self {
            present: true,
            movement_score: None,
        }
    }
}

/// A detected time range of sustained human movement, in seconds.
///
/// Half-open interval over the source timeline: `start < end`,
/// `0 <= start`, `end <= duration`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A padded, clamped time range actually cut from the source.
///
/// Guaranteed `end - start >= 1.0` and `0 <= start < end <= duration`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionWindow {
    pub start: f64,
    pub end: f64,
}

impl ExtractionWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}
