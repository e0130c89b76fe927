//! Task executor: consumes per-file tasks from the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use mreel_queue::{JobQueue, QueueJob};

use crate::error::{WorkerError, WorkerResult};
use crate::task::{run_file_task, TaskContext};

/// Executor that pulls tasks from the queue and runs them concurrently
/// up to a configured bound.
pub struct JobExecutor {
    ctx: Arc<TaskContext>,
    queue: Arc<JobQueue>,
    task_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new executor.
    pub fn new(ctx: TaskContext, queue: JobQueue) -> Self {
        let task_semaphore = Arc::new(Semaphore::new(ctx.config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            ctx: Arc::new(ctx),
            queue: Arc::new(queue),
            task_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Start the executor loop. Runs until shutdown is signalled.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting executor '{}' with {} max concurrent tasks",
            self.consumer_name, self.ctx.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        // Periodically claim tasks orphaned by crashed workers
        let queue_clone = Arc::clone(&self.queue);
        let consumer_name = self.consumer_name.clone();
        let ctx_clone = Arc::clone(&self.ctx);
        let semaphore_clone = Arc::clone(&self.task_semaphore);
        let claim_interval = self.ctx.config.claim_interval;
        let claim_min_idle = self.ctx.config.claim_min_idle;
        let mut shutdown_rx_claim = self.shutdown.subscribe();

        let claim_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx_claim.changed() => {
                        if *shutdown_rx_claim.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match queue_clone
                            .claim_pending(&consumer_name, claim_min_idle.as_millis() as u64, 5)
                            .await
                        {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!("Claimed {} pending tasks", jobs.len());
                                for (message_id, job) in jobs {
                                    let ctx = Arc::clone(&ctx_clone);
                                    let queue = Arc::clone(&queue_clone);
                                    let Ok(permit) =
                                        semaphore_clone.clone().acquire_owned().await
                                    else {
                                        break;
                                    };

                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_task(ctx, queue, message_id, job).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!("Failed to claim pending tasks: {}", e);
                            }
                        }
                    }
                }
            }
        });

        // Main consumption loop
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_tasks() => {
                    if let Err(e) = result {
                        error!("Error consuming tasks: {}", e);
                        // Back off on error
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        // Wait for in-flight tasks to complete
        info!("Waiting for in-flight tasks to complete...");
        let _ = tokio::time::timeout(Duration::from_secs(60), self.wait_for_tasks()).await;

        info!("Executor stopped");
        Ok(())
    }

    /// Consume and dispatch tasks from the queue.
    async fn consume_tasks(&self) -> WorkerResult<()> {
        let available = self.task_semaphore.available_permits();
        if available == 0 {
            // All slots busy, wait a bit
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(
                &self.consumer_name,
                1000, // Block for 1 second
                available.min(5),
            )
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} tasks from queue", jobs.len());

        for (message_id, job) in jobs {
            let ctx = Arc::clone(&self.ctx);
            let queue = Arc::clone(&self.queue);
            let permit = self
                .task_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::task_failed("Semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_task(ctx, queue, message_id, job).await;
            });
        }

        Ok(())
    }

    /// Execute a single task with retry and DLQ handling.
    ///
    /// Pipeline failures are already absorbed into the item record by the
    /// orchestrator; an `Err` here means the store was unreachable and the
    /// delivery should be retried.
    async fn execute_task(
        ctx: Arc<TaskContext>,
        queue: Arc<JobQueue>,
        message_id: String,
        job: QueueJob,
    ) {
        let QueueJob::ProcessFile(task) = &job;
        info!(
            job_id = %task.job_id,
            file_id = %task.file_id,
            "Executing task"
        );

        match run_file_task(&ctx, task).await {
            Ok(()) => {
                if let Err(e) = queue.ack(&message_id).await {
                    error!("Failed to ack task {}: {}", message_id, e);
                }
                if let Err(e) = queue.clear_dedup(&job).await {
                    warn!("Failed to clear dedup key for {}: {}", message_id, e);
                }
            }
            Err(e) => {
                error!("Task {} failed before processing: {}", message_id, e);

                let retry_count = queue.increment_retry(&message_id).await.unwrap_or(u32::MAX);
                let max_retries = queue.max_retries();

                if retry_count >= max_retries {
                    warn!(
                        "Task {} exceeded max retries ({}), moving to DLQ",
                        message_id, max_retries
                    );
                    if let Err(dlq_err) = queue.dlq(&message_id, &job, &e.to_string()).await {
                        error!("Failed to move task {} to DLQ: {}", message_id, dlq_err);
                    }
                    if let Err(e) = queue.clear_dedup(&job).await {
                        warn!("Failed to clear dedup key for {}: {}", message_id, e);
                    }
                } else {
                    info!(
                        "Task {} will be retried (attempt {}/{})",
                        message_id, retry_count, max_retries
                    );
                    // Redelivered after the visibility window via claim_pending
                }
            }
        }
    }

    /// Wait for all in-flight tasks to complete.
    async fn wait_for_tasks(&self) {
        loop {
            if self.task_semaphore.available_permits() == self.ctx.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
