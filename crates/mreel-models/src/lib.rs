//! Shared data models for the MotionReel backend.
//!
//! This crate provides Serde-serializable types for:
//! - Batch jobs and their per-file items
//! - Item/job status enums and the aggregate status derivation
//! - Merge-patch structs for store updates
//! - Timeline primitives (frame signals, segments, extraction windows)

pub mod job;
pub mod status;
pub mod timeline;

// Re-export common types
pub use job::{FileId, ItemPatch, Job, JobId, JobItem, JobPatch};
pub use status::{derive_batch_status, ItemStatus, JobStatus};
pub use timeline::{ExtractionWindow, FrameSignal, Segment};
