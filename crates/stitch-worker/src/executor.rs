//! Job executor.
//!
//! Consumes jobs from the Redis stream with bounded concurrency, acks on
//! success, and routes exhausted or non-retryable failures to the DLQ.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use stitch_queue::{JobQueue, QueueJob};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::pipeline::{run_pipeline, PipelineContext};

/// Job executor that processes jobs from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", uuid::Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Start the executor. Returns when shutdown has been signalled and all
    /// in-flight jobs have finished.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            max_concurrent = self.config.max_concurrent_jobs,
            "starting job executor"
        );

        self.queue.init().await?;

        let ctx = Arc::new(PipelineContext::new(self.config.clone())?);

        let claim_task = self.spawn_claim_task(ctx.clone());

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_batch(ctx.clone()) => {
                    if let Err(e) = result {
                        error!(error = %e, "queue consume failed, backing off");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        // Wait for in-flight jobs by draining all permits.
        let drain = self
            .job_semaphore
            .clone()
            .acquire_many_owned(self.config.max_concurrent_jobs as u32);
        match tokio::time::timeout(self.config.shutdown_timeout, drain).await {
            Ok(_) => info!("job executor stopped"),
            Err(_) => warn!("shutdown timeout reached with jobs still running"),
        }

        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Read a batch sized to the free permits and spawn a task per job.
    async fn consume_batch(&self, ctx: Arc<PipelineContext>) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(250)).await;
            return Ok(());
        }

        let batch = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        for (message_id, job) in batch {
            self.dispatch(ctx.clone(), message_id, job).await;
        }

        Ok(())
    }

    async fn dispatch(&self, ctx: Arc<PipelineContext>, message_id: String, job: QueueJob) {
        let permit = match self.job_semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return, // semaphore closed, shutting down
        };

        let queue = self.queue.clone();
        tokio::spawn(async move {
            Self::handle_job(ctx, queue, &message_id, job).await;
            drop(permit);
        });
    }

    /// Run one job and settle its queue message.
    async fn handle_job(
        ctx: Arc<PipelineContext>,
        queue: Arc<JobQueue>,
        message_id: &str,
        job: QueueJob,
    ) {
        let job_id = job.job_id().to_string();
        info!(job_id = %job_id, message_id = %message_id, "job started");

        match Self::process_job(&ctx, &job).await {
            Ok(()) => {
                info!(job_id = %job_id, "job completed");
                if let Err(e) = queue.ack(message_id).await {
                    error!(job_id = %job_id, error = %e, "failed to ack completed job");
                }
                if let Err(e) = queue.clear_dedup(&job.idempotency_key()).await {
                    warn!(job_id = %job_id, error = %e, "failed to clear dedup key");
                }
            }
            Err(e) => {
                // An unreadable retry counter counts as exhausted rather
                // than risking an endless redelivery loop.
                let retries = queue.increment_retry(message_id).await.unwrap_or(u32::MAX);
                let exhausted = retries >= queue.max_retries();

                if exhausted || !e.is_retryable() {
                    error!(
                        job_id = %job_id,
                        error = %e,
                        retries,
                        retryable = e.is_retryable(),
                        "job moved to DLQ"
                    );
                    if let Err(dlq_err) = queue.dlq(message_id, &job, &e.to_string()).await {
                        error!(job_id = %job_id, error = %dlq_err, "failed to move job to DLQ");
                    }
                    if let Err(clear_err) = queue.clear_dedup(&job.idempotency_key()).await {
                        warn!(job_id = %job_id, error = %clear_err, "failed to clear dedup key");
                    }
                } else {
                    // Leave the message pending; the claim task redelivers it.
                    warn!(job_id = %job_id, error = %e, retries, "job failed, will retry");
                }
            }
        }
    }

    async fn process_job(ctx: &PipelineContext, job: &QueueJob) -> WorkerResult<()> {
        match job {
            QueueJob::ProcessSegments(j) => run_pipeline(ctx, j).await,
        }
    }

    /// Periodically reclaim messages stranded by crashed workers.
    fn spawn_claim_task(&self, ctx: Arc<PipelineContext>) -> tokio::task::JoinHandle<()> {
        let queue = self.queue.clone();
        let semaphore = self.job_semaphore.clone();
        let consumer_name = self.consumer_name.clone();
        let interval = self.config.claim_interval;
        let min_idle_ms = self.config.claim_min_idle.as_millis() as u64;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let available = semaphore.available_permits();
                if available == 0 {
                    continue;
                }

                let claimed = match queue
                    .claim_pending(&consumer_name, min_idle_ms, available.min(5))
                    .await
                {
                    Ok(claimed) => claimed,
                    Err(e) => {
                        warn!(error = %e, "claiming pending jobs failed");
                        continue;
                    }
                };

                for (message_id, job) in claimed {
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };
                    let ctx = ctx.clone();
                    let queue = queue.clone();
                    tokio::spawn(async move {
                        Self::handle_job(ctx, queue, &message_id, job).await;
                        drop(permit);
                    });
                }
            }
        })
    }
}
