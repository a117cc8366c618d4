use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::services::queue::NotificationQueue;
use crate::services::sender::NotificationSender;
use crate::{backoff_delay, NotificationError, NotificationJob, NotificationStatus, WorkerConfig};

/// Consumer side of the notification queue: `concurrency` loops that pull due
/// jobs, send them, and retry failures with exponential backoff.
pub struct NotificationWorker {
    config: WorkerConfig,
    queue: Arc<dyn NotificationQueue>,
    sender: Arc<dyn NotificationSender>,
    is_shutdown: Arc<AtomicBool>,
}

impl NotificationWorker {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<dyn NotificationQueue>,
        sender: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            config,
            queue,
            sender,
            is_shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(
            "Starting notification worker {} with {} loop(s)",
            self.config.worker_id, self.config.concurrency
        );

        (0..self.config.concurrency)
            .map(|i| {
                let worker = Arc::clone(self);
                let worker_name = format!("{}-{}", self.config.worker_id, i);
                tokio::spawn(async move { worker.worker_loop(worker_name).await })
            })
            .collect()
    }

    /// Loops stop after the job they are currently sending.
    pub fn shutdown(&self) {
        info!("Stopping notification worker {}", self.config.worker_id);
        self.is_shutdown.store(true, Ordering::SeqCst);
    }

    async fn worker_loop(&self, worker_name: String) {
        debug!("Worker loop started: {}", worker_name);

        while !self.is_shutdown.load(Ordering::SeqCst) {
            match self.queue.dequeue().await {
                Ok(Some(job)) => {
                    if let Err(e) = self.process_job(job).await {
                        error!("Worker {} failed to record job outcome: {}", worker_name, e);
                    }
                }
                Ok(None) => sleep(self.config.poll_interval).await,
                Err(e) => {
                    error!("Worker {} failed to dequeue job: {}", worker_name, e);
                    sleep(self.config.poll_interval * 4).await;
                }
            }
        }

        debug!("Worker loop ended: {}", worker_name);
    }

    #[instrument(skip(self, job), fields(job_id = %job.job_id, channel = %job.channel))]
    pub async fn process_job(&self, mut job: NotificationJob) -> Result<NotificationStatus, NotificationError> {
        job.transition(NotificationStatus::Sending);
        job.attempts += 1;

        match self.sender.send(&job.payload).await {
            Ok(()) => {
                job.last_error = None;
                job.transition(NotificationStatus::Delivered);
                info!("Notification delivered on attempt {}", job.attempts);
                self.queue.finish(&job).await?;
            }
            Err(e @ NotificationError::NotConfigured { .. }) | Err(e @ NotificationError::InvalidRecipient(_)) => {
                warn!("Notification skipped: {}", e);
                job.last_error = Some(e.to_string());
                job.transition(NotificationStatus::Failed);
                self.queue.finish(&job).await?;
            }
            Err(e) if job.can_retry() => {
                let delay = backoff_delay(job.attempts, self.config.base_backoff, self.config.max_backoff);
                warn!(
                    "Notification attempt {}/{} failed, retrying in {:?}: {}",
                    job.attempts, job.max_attempts, delay, e
                );
                job.last_error = Some(e.to_string());
                job.next_attempt_at = Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(60));
                job.transition(NotificationStatus::Retrying);
                self.queue.reschedule(&job).await?;
            }
            Err(e) => {
                error!("Notification failed after {} attempts: {}", job.attempts, e);
                job.last_error = Some(e.to_string());
                job.transition(NotificationStatus::Failed);
                self.queue.finish(&job).await?;
            }
        }

        Ok(job.status)
    }
}
