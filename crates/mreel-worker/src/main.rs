//! Video processing worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mreel_pose::PoseClient;
use mreel_queue::JobQueue;
use mreel_store::RedisJobStore;
use mreel_worker::{FfmpegPipeline, JobExecutor, TaskContext, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("mreel=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting mreel-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let store = match RedisJobStore::from_env() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create job store: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let pose = match PoseClient::from_env() {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create pose client: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = pose.healthcheck().await {
        warn!("Pose service not reachable yet: {}", e);
    }

    let pipeline = FfmpegPipeline::new(pose, config.prepare.clone());
    let ctx = TaskContext {
        config,
        store,
        pipeline: Arc::new(pipeline),
    };

    let executor = Arc::new(JobExecutor::new(ctx, queue));

    // Signal handler flips the shutdown watch
    let executor_signal = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        executor_signal.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
