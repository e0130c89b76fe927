//! Video processing worker.
//!
//! Consumes per-file tasks from the queue and drives each one through
//! prepare -> detect -> plan -> compile, reporting progress to the job
//! store at every phase. One file's failure never touches its siblings.

pub mod config;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod task;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use pipeline::{FfmpegPipeline, VideoPipeline};
pub use task::{run_file_task, TaskContext};
