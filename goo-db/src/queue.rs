//! Job queue stored in the `jobs` table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use goo_job_queue::{CancellationToken, Delivery, Message, Queue, QueueError, Receipt};
use sqlx::Row;
use tokio::time::Instant;
use tracing::trace;

use crate::pool::DbPool;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polling settings for [`DbQueue`].
#[derive(Debug, Clone, Copy)]
pub struct DbQueueConfig {
    /// How long a receive call waits for a message before returning `None`.
    pub wait_time: Duration,
    /// How long a received message stays hidden from other receivers.
    pub visibility_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for DbQueueConfig {
    fn default() -> Self {
        Self {
            wait_time: goo_job_queue::DEFAULT_WAIT_TIME,
            visibility_timeout: goo_job_queue::DEFAULT_VISIBILITY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// A [`Queue`] backed by the database, so jobs survive restarts.
#[derive(Debug, Clone)]
pub struct DbQueue {
    pool: DbPool,
    config: DbQueueConfig,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl DbQueue {
    pub fn new(pool: DbPool, config: DbQueueConfig) -> Self {
        Self { pool, config }
    }

    /// Claim the oldest visible message, hiding it for the visibility timeout.
    async fn claim(&self) -> Result<Option<Delivery>, QueueError> {
        let now = now_millis();
        let receipt = Receipt::generate();

        let row = sqlx::query(
            "update jobs set receipt = $1, visible_at = $2, receive_count = receive_count + 1 \
             where id = (select id from jobs where visible_at <= $3 order by id limit 1) \
             and visible_at <= $3 \
             returning body",
        )
        .bind(receipt.as_str())
        .bind(now.saturating_add(millis(self.config.visibility_timeout)))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueueError::backend)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let body: String = row.try_get("body").map_err(QueueError::backend)?;
        let message = Message::from_json(&body)?;
        Ok(Some(Delivery::new(message, receipt)))
    }

    /// Number of stored messages, in flight or not.
    pub async fn len(&self) -> Result<i64, QueueError> {
        sqlx::query_scalar("select count(*) from jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(QueueError::backend)
    }

    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }
}

#[async_trait]
impl Queue for DbQueue {
    async fn send(&self, message: &Message) -> Result<(), QueueError> {
        sqlx::query("insert into jobs (body, visible_at) values ($1, $2)")
            .bind(message.to_json()?)
            .bind(now_millis())
            .execute(&self.pool)
            .await
            .map_err(QueueError::backend)?;
        trace!(job = message.job().unwrap_or_default(), "Queued message");
        Ok(())
    }

    /// An empty receive lasts at least one `poll_interval`, even with a zero `wait_time`.
    async fn receive(&self, cancel: &CancellationToken) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + self.config.wait_time.max(self.config.poll_interval);
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            if let Some(delivery) = self.claim().await? {
                return Ok(Some(delivery));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let pause = self.config.poll_interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    async fn delete(&self, receipt: &Receipt) -> Result<(), QueueError> {
        let result = sqlx::query("delete from jobs where receipt = $1")
            .bind(receipt.as_str())
            .execute(&self.pool)
            .await
            .map_err(QueueError::backend)?;
        if result.rows_affected() == 0 {
            return Err(QueueError::ReceiptNotFound(receipt.clone()));
        }
        Ok(())
    }
}
