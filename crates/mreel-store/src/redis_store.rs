//! Redis-backed job store with versioned compare-and-swap updates.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::{debug, warn};

use mreel_models::{FileId, ItemPatch, Job, JobId, JobPatch};

use crate::error::{StoreError, StoreResult};
use crate::patch::{apply_item_patch, apply_job_patch};
use crate::JobStore;

/// Commit the new document only if the stored version still matches the
/// one the patch was computed against. Returns 1 on success, 0 on a
/// version conflict, -1 when the record vanished.
const CAS_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
    return -1
end
local doc = cjson.decode(raw)
if tostring(doc.version) ~= ARGV[1] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2])
local ttl = tonumber(ARGV[3])
if ttl > 0 then
    redis.call('EXPIRE', KEYS[1], ttl)
end
return 1
"#;

/// Redis store configuration.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis URL
    pub redis_url: String,
    /// Record TTL in seconds (0 = keep forever)
    pub ttl_secs: u64,
    /// Max CAS retries before giving up
    pub max_retries: u32,
    /// Base backoff delay between retries (milliseconds)
    pub base_delay_ms: u64,
    /// Backoff cap (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            ttl_secs: 86_400,
            max_retries: 10,
            base_delay_ms: 5,
            max_delay_ms: 250,
        }
    }
}

impl RedisStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            ttl_secs: std::env::var("JOB_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.ttl_secs),
            max_retries: defaults.max_retries,
            base_delay_ms: defaults.base_delay_ms,
            max_delay_ms: defaults.max_delay_ms,
        }
    }
}

/// Job store backed by Redis.
///
/// Every update is an optimistic read-modify-write: load the document,
/// apply the patch and derivation in Rust, then swap it in with a script
/// that checks the embedded version counter. A conflicting sibling write
/// just means another load-patch-swap round; callers never observe the
/// race.
pub struct RedisJobStore {
    client: redis::Client,
    script: redis::Script,
    config: RedisStoreConfig,
}

impl RedisJobStore {
    /// Create a new Redis job store.
    pub fn new(config: RedisStoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            script: redis::Script::new(CAS_SCRIPT),
            config,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(RedisStoreConfig::from_env())
    }

    fn key(job_id: &JobId) -> String {
        format!("mreel:job:{job_id}")
    }

    async fn load(&self, job_id: &JobId) -> StoreResult<Job> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::key(job_id))
            .query_async(&mut conn)
            .await?;
        let raw = raw.ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Run one load-patch-swap round trip per attempt until the swap
    /// lands or the attempts are used up.
    async fn update_with<F>(&self, job_id: &JobId, mut apply: F) -> StoreResult<Job>
    where
        F: FnMut(&mut Job) -> StoreResult<()>,
    {
        for attempt in 0..=self.config.max_retries {
            let mut job = self.load(job_id).await?;
            let expected_version = job.version;

            apply(&mut job)?;
            job.version = expected_version + 1;

            let payload = serde_json::to_string(&job)?;
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let outcome: i64 = self
                .script
                .key(Self::key(job_id))
                .arg(expected_version.to_string())
                .arg(payload)
                .arg(self.config.ttl_secs)
                .invoke_async(&mut conn)
                .await?;

            match outcome {
                1 => return Ok(job),
                0 => {
                    let delay = backoff_delay(
                        attempt,
                        self.config.base_delay_ms,
                        self.config.max_delay_ms,
                    );
                    debug!(
                        job_id = %job_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Job update lost a version race, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => return Err(StoreError::JobNotFound(job_id.to_string())),
            }
        }

        warn!(job_id = %job_id, "Job update retries exhausted");
        Err(StoreError::Conflict(job_id.to_string()))
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn create(&self, job: Job) -> StoreResult<Job> {
        let payload = serde_json::to_string(&job)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(Self::key(&job.job_id)).arg(payload).arg("NX");
        if self.config.ttl_secs > 0 {
            cmd.arg("EX").arg(self.config.ttl_secs);
        }
        let created: Option<String> = cmd.query_async(&mut conn).await?;

        if created.is_none() {
            return Err(StoreError::AlreadyExists(job.job_id.to_string()));
        }
        Ok(job)
    }

    async fn get(&self, job_id: &JobId) -> StoreResult<Job> {
        self.load(job_id).await
    }

    async fn update_item(
        &self,
        job_id: &JobId,
        file_id: &FileId,
        patch: ItemPatch,
    ) -> StoreResult<Job> {
        self.update_with(job_id, |job| apply_item_patch(job, file_id, &patch))
            .await
    }

    async fn update_job(&self, job_id: &JobId, patch: JobPatch) -> StoreResult<Job> {
        self.update_with(job_id, |job| {
            apply_job_patch(job, &patch);
            Ok(())
        })
        .await
    }
}

/// Exponential backoff with full jitter, no rand dependency.
fn backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    let exp_delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    let capped_delay = exp_delay.min(max_delay_ms);

    let jittered = if capped_delay > 0 {
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let random_factor = (nanos % 1000) as f64 / 1000.0;
        ((capped_delay as f64) * random_factor) as u64
    } else {
        0
    };

    Duration::from_millis(jittered.max(base_delay_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped_and_never_below_base() {
        let delay = backoff_delay(20, 5, 250);
        assert!(delay.as_millis() >= 5);
        assert!(delay.as_millis() <= 250);
    }

    #[test]
    fn job_key_is_namespaced() {
        assert_eq!(RedisJobStore::key(&JobId::from("abc")), "mreel:job:abc");
    }
}
