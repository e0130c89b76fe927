//! Client for the pose-inference sidecar service.
//!
//! The sidecar decodes a prepared video and runs pose-landmark inference
//! over every frame, returning one `FrameSignal` per frame in decode
//! order: whether a human is present, and the mean landmark displacement
//! against the previous frame when one is computable.

pub mod client;
pub mod error;

pub use client::{FrameAnalysis, PoseClient, PoseConfig, SampleOptions};
pub use error::{PoseError, PoseResult};
