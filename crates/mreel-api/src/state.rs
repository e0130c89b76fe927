//! Application state.

use std::sync::Arc;

use mreel_queue::JobQueue;
use mreel_store::{JobStore, RedisJobStore};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn JobStore>,
    pub queue: Arc<JobQueue>,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = RedisJobStore::from_env()?;
        let queue = JobQueue::from_env()?;

        tokio::fs::create_dir_all(&config.upload_dir).await?;

        Ok(Self {
            config,
            store: Arc::new(store),
            queue: Arc::new(queue),
        })
    }
}
