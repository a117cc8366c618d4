use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{NotificationError, NotificationJob};

/// Outbound notification queue.
///
/// Jobs become visible to `dequeue` once their `next_attempt_at` has passed;
/// a dequeued job belongs to exactly one worker until it is rescheduled or
/// finished.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn enqueue(&self, job: &NotificationJob) -> Result<(), NotificationError>;

    async fn dequeue(&self) -> Result<Option<NotificationJob>, NotificationError>;

    /// Stores the job and makes it due again at its `next_attempt_at`.
    async fn reschedule(&self, job: &NotificationJob) -> Result<(), NotificationError>;

    /// Stores a job that reached a terminal status.
    async fn finish(&self, job: &NotificationJob) -> Result<(), NotificationError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<NotificationJob>, NotificationError>;
}

// ==============================================================================
// IN-PROCESS QUEUE
// ==============================================================================

/// Terminal jobs kept for `get_job`; older ones are evicted first.
const FINISHED_HISTORY: usize = 256;

#[derive(Default)]
struct InMemoryState {
    jobs: HashMap<Uuid, NotificationJob>,
    pending: VecDeque<Uuid>,
    finished: VecDeque<Uuid>,
}

#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<InMemoryState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Jobs held in memory, pending and finished.
    pub async fn stored_len(&self) -> usize {
        self.state.lock().await.jobs.len()
    }
}

#[async_trait]
impl NotificationQueue for InMemoryQueue {
    async fn enqueue(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        let mut state = self.state.lock().await;
        state.jobs.insert(job.job_id, job.clone());
        state.pending.push_back(job.job_id);
        debug!("Job {} enqueued in memory", job.job_id);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<NotificationJob>, NotificationError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let position = state
            .pending
            .iter()
            .position(|id| state.jobs.get(id).is_some_and(|job| job.is_due(now)));

        let Some(index) = position else {
            return Ok(None);
        };
        let job_id = state.pending.remove(index);

        Ok(job_id.and_then(|id| state.jobs.get(&id).cloned()))
    }

    async fn reschedule(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        let mut state = self.state.lock().await;
        state.jobs.insert(job.job_id, job.clone());
        state.pending.push_back(job.job_id);
        Ok(())
    }

    async fn finish(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        let mut state = self.state.lock().await;
        state.jobs.insert(job.job_id, job.clone());
        if !state.finished.contains(&job.job_id) {
            state.finished.push_back(job.job_id);
        }

        while state.finished.len() > FINISHED_HISTORY {
            if let Some(evicted) = state.finished.pop_front() {
                state.jobs.remove(&evicted);
                debug!("Evicted finished job {} from memory", evicted);
            }
        }
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<NotificationJob>, NotificationError> {
        Ok(self.state.lock().await.jobs.get(&job_id).cloned())
    }
}

// ==============================================================================
// REDIS QUEUE
// ==============================================================================

const SCHEDULE_KEY: &str = "notification_queue:scheduled";
const JOB_TTL_SECONDS: i64 = 604_800;

fn job_key(job_id: Uuid) -> String {
    format!("notification_job:{}", job_id)
}

/// Jobs are stored as JSON under `notification_job:{id}`; due times live in
/// a sorted set scored by `next_attempt_at` in epoch milliseconds.
pub struct RedisQueue {
    pool: Pool,
}

impl RedisQueue {
    pub async fn new(redis_url: &str) -> Result<Self, NotificationError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            NotificationError::QueueError(format!("Failed to create Redis pool: {}", e))
        })?;

        let queue = Self { pool };
        let mut conn = queue.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis notification queue initialized");

        Ok(queue)
    }

    async fn get_connection(&self) -> Result<Connection, NotificationError> {
        self.pool
            .get()
            .await
            .map_err(|e| NotificationError::QueueError(format!("Failed to get Redis connection: {}", e)))
    }

    async fn store(&self, conn: &mut Connection, job: &NotificationJob) -> Result<(), NotificationError> {
        let data = serde_json::to_string(job)?;
        let key = job_key(job.job_id);
        let _: () = conn.set(&key, data).await?;
        let _: () = conn.expire(&key, JOB_TTL_SECONDS as usize).await?;
        Ok(())
    }

    async fn schedule(&self, conn: &mut Connection, job: &NotificationJob) -> Result<(), NotificationError> {
        let score = job.next_attempt_at.timestamp_millis();
        let _: () = conn.zadd(SCHEDULE_KEY, job.job_id.to_string(), score).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationQueue for RedisQueue {
    async fn enqueue(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        let mut conn = self.get_connection().await?;
        self.store(&mut conn, job).await?;
        self.schedule(&mut conn, job).await?;
        debug!("Job {} enqueued in Redis", job.job_id);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<NotificationJob>, NotificationError> {
        let mut conn = self.get_connection().await?;
        let now = Utc::now().timestamp_millis();

        let due: Vec<String> = conn
            .zrangebyscore_limit(SCHEDULE_KEY, "-inf", now, 0, 1)
            .await?;

        let Some(id) = due.into_iter().next() else {
            return Ok(None);
        };

        // ZREM succeeds for exactly one competing worker.
        let claimed: i64 = conn.zrem(SCHEDULE_KEY, &id).await?;
        if claimed == 0 {
            return Ok(None);
        }

        let job_id = Uuid::parse_str(&id)
            .map_err(|e| NotificationError::QueueError(format!("Corrupt job id {}: {}", id, e)))?;
        let data: Option<String> = conn.get(job_key(job_id)).await?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Err(NotificationError::JobNotFound(id)),
        }
    }

    async fn reschedule(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        let mut conn = self.get_connection().await?;
        self.store(&mut conn, job).await?;
        self.schedule(&mut conn, job).await
    }

    async fn finish(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        let mut conn = self.get_connection().await?;
        self.store(&mut conn, job).await
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<NotificationJob>, NotificationError> {
        let mut conn = self.get_connection().await?;
        let data: Option<String> = conn.get(job_key(job_id)).await?;

        data.map(|d| serde_json::from_str(&d).map_err(NotificationError::from))
            .transpose()
    }
}
