//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use mreel_media::{DetectorParams, PlannerParams, PrepareOptions};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent file tasks
    pub max_concurrent_jobs: usize,
    /// Where the API writes raw uploads (per-job subdirectories)
    pub upload_dir: PathBuf,
    /// Scratch space for prepared/intermediate files
    pub processing_dir: PathBuf,
    /// Where compiled highlight files land
    pub download_dir: PathBuf,
    /// How often the worker scans for orphaned pending tasks
    pub claim_interval: Duration,
    /// Minimum idle time before a pending task can be claimed (crash recovery)
    pub claim_min_idle: Duration,
    /// Segment detection parameters
    pub detector: DetectorParams,
    /// Window planning parameters
    pub planner: PlannerParams,
    /// Normalization options applied during prepare
    pub prepare: PrepareOptions,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            upload_dir: PathBuf::from("/tmp/mreel/uploads"),
            processing_dir: PathBuf::from("/tmp/mreel/processing"),
            download_dir: PathBuf::from("/tmp/mreel/downloads"),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            detector: DetectorParams::default(),
            planner: PlannerParams::default(),
            prepare: PrepareOptions::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            processing_dir: std::env::var("PROCESSING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.processing_dir),
            download_dir: std::env::var("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            claim_interval: Duration::from_secs(
                std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            claim_min_idle: Duration::from_secs(
                std::env::var("WORKER_CLAIM_MIN_IDLE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            detector: DetectorParams::from_env(),
            planner: PlannerParams::from_env(),
            prepare: PrepareOptions::from_env(),
        }
    }
}
