//! Redis Streams job queue.
//!
//! This crate provides:
//! - Task enqueueing via Redis Streams with idempotency dedup
//! - Worker consumption with retry accounting and a dead-letter stream
//! - Crash recovery by claiming long-pending deliveries

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::{ProcessFileJob, QueueJob};
pub use queue::{JobQueue, QueueConfig};
