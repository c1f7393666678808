//! Durable SQLite queue transport.
//!
//! Implements `QueueSource` and `QueueSink` from `driprail-core` on the
//! split-pool database. One `visible_at` column carries both delayed
//! delivery and the visibility lease: a row is deliverable whenever
//! `visible_at <= now`, and claiming it pushes `visible_at` into the
//! future by the visibility window. Crash recovery is free -- an expired
//! lease is just a row whose `visible_at` has passed again.
//!
//! Timestamps are RFC 3339 TEXT (UTC, fixed offset), which compares
//! correctly as a string, so the visibility checks happen in SQL.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::Row;

use driprail_core::queue::{QueueSink, QueueSource};
use driprail_types::error::QueueError;
use driprail_types::queue::{MessageId, QueueMessage};
use driprail_types::trigger::TriggerEvent;

use super::pool::DatabasePool;

/// Deliveries allowed before a message is treated as poisoned.
const DEFAULT_MAX_RECEIVE_COUNT: i32 = 5;

/// SQLite-backed queue with visibility-timeout semantics.
///
/// Messages that reach `max_receive_count` undelivered are moved to the
/// `queue_archive` table during `poll` instead of being delivered again,
/// so one poisoned payload cannot occupy the worker forever.
pub struct SqliteQueue {
    pool: DatabasePool,
    max_receive_count: i32,
}

impl SqliteQueue {
    /// Create a queue with the default poison threshold.
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
        }
    }

    /// Override the poison threshold (worker config).
    pub fn with_max_receive_count(mut self, max_receive_count: i32) -> Self {
        self.max_receive_count = max_receive_count;
        self
    }

    async fn enqueue(
        &self,
        event: &TriggerEvent,
        visible_at: DateTime<Utc>,
    ) -> Result<MessageId, QueueError> {
        let body = serde_json::to_string(event).map_err(|e| QueueError::Encode(e.to_string()))?;
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO queue_messages (body, receive_count, enqueued_at, visible_at)
             VALUES (?, 0, ?, ?)",
        )
        .bind(&body)
        .bind(format_datetime(&now))
        .bind(format_datetime(&visible_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| QueueError::Storage(e.to_string()))?;

        Ok(MessageId(result.last_insert_rowid()))
    }

    /// Move messages that exhausted their deliveries to the archive table.
    /// Runs inside one writer transaction so a row is never half-moved.
    async fn archive_poisoned(&self, now: &DateTime<Utc>) -> Result<u64, QueueError> {
        let now_str = format_datetime(now);

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| QueueError::Storage(e.to_string()))?;

        let archived = sqlx::query(
            "INSERT INTO queue_archive (id, body, receive_count, enqueued_at, archived_at, reason)
             SELECT id, body, receive_count, enqueued_at, ?, 'max_receive_count_exceeded'
             FROM queue_messages
             WHERE visible_at <= ? AND receive_count >= ?",
        )
        .bind(&now_str)
        .bind(&now_str)
        .bind(self.max_receive_count)
        .execute(&mut *tx)
        .await
        .map_err(|e| QueueError::Storage(e.to_string()))?;

        sqlx::query("DELETE FROM queue_messages WHERE visible_at <= ? AND receive_count >= ?")
            .bind(&now_str)
            .bind(self.max_receive_count)
            .execute(&mut *tx)
            .await
            .map_err(|e| QueueError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| QueueError::Storage(e.to_string()))?;

        Ok(archived.rows_affected())
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, QueueError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| QueueError::Storage(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<QueueMessage, QueueError> {
    let id: i64 = row
        .try_get("id")
        .map_err(|e| QueueError::Storage(e.to_string()))?;
    let body: String = row
        .try_get("body")
        .map_err(|e| QueueError::Storage(e.to_string()))?;
    let receive_count: i32 = row
        .try_get("receive_count")
        .map_err(|e| QueueError::Storage(e.to_string()))?;
    let enqueued_at: String = row
        .try_get("enqueued_at")
        .map_err(|e| QueueError::Storage(e.to_string()))?;
    let visible_at: String = row
        .try_get("visible_at")
        .map_err(|e| QueueError::Storage(e.to_string()))?;

    Ok(QueueMessage {
        id: MessageId(id),
        body,
        receive_count,
        enqueued_at: parse_datetime(&enqueued_at)?,
        lease_expires_at: parse_datetime(&visible_at)?,
    })
}

impl QueueSource for SqliteQueue {
    async fn poll(
        &self,
        max: usize,
        visibility: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(visibility)
            .map_err(|e| QueueError::Storage(format!("visibility out of range: {e}")))?;

        let archived = self.archive_poisoned(&now).await?;
        if archived > 0 {
            tracing::warn!(count = archived, "archived poisoned queue messages");
        }

        // Claim atomically: bump the receive count and push visible_at past
        // the lease in the same statement, returning what was claimed.
        let rows = sqlx::query(
            "UPDATE queue_messages
             SET receive_count = receive_count + 1, visible_at = ?
             WHERE id IN (
                 SELECT id FROM queue_messages
                 WHERE visible_at <= ?
                 ORDER BY id
                 LIMIT ?
             )
             RETURNING id, body, receive_count, enqueued_at, visible_at",
        )
        .bind(format_datetime(&(now + lease)))
        .bind(format_datetime(&now))
        .bind(max as i64)
        .fetch_all(&self.pool.writer)
        .await
        .map_err(|e| QueueError::Storage(e.to_string()))?;

        rows.iter().map(message_from_row).collect()
    }

    async fn acknowledge(&self, ids: &[MessageId]) -> Result<(), QueueError> {
        if ids.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM queue_messages WHERE id IN ({placeholders})");

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.0);
        }
        query
            .execute(&self.pool.writer)
            .await
            .map_err(|e| QueueError::Storage(e.to_string()))?;

        Ok(())
    }
}

impl QueueSink for SqliteQueue {
    async fn send(&self, event: &TriggerEvent) -> Result<MessageId, QueueError> {
        self.enqueue(event, Utc::now()).await
    }

    async fn send_delayed(
        &self,
        event: &TriggerEvent,
        delay: Duration,
    ) -> Result<MessageId, QueueError> {
        let delay = chrono::Duration::from_std(delay)
            .map_err(|e| QueueError::Storage(format!("delay out of range: {e}")))?;
        self.enqueue(event, Utc::now() + delay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::DatabasePool;
    use driprail_types::account::AccountId;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn event() -> TriggerEvent {
        TriggerEvent::new("tag_contact", AccountId::new())
    }

    #[tokio::test]
    async fn test_send_poll_acknowledge() {
        let queue = SqliteQueue::new(test_pool().await);

        let id = queue.send(&event()).await.unwrap();
        let batch = queue.poll(10, Duration::from_secs(30)).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, id);
        assert_eq!(batch[0].receive_count, 1);
        batch[0].decode().unwrap();

        queue.acknowledge(&[id]).await.unwrap();
        assert!(queue.poll(10, Duration::from_secs(30)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leased_message_invisible_until_expiry() {
        let queue = SqliteQueue::new(test_pool().await);
        queue.send(&event()).await.unwrap();

        let first = queue.poll(10, Duration::from_millis(80)).await.unwrap();
        assert_eq!(first.len(), 1);

        // Still leased.
        assert!(queue.poll(10, Duration::from_millis(80)).await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(120)).await;

        // Redelivered with a bumped count.
        let redelivered = queue.poll(10, Duration::from_secs(30)).await.unwrap();
        assert_eq!(redelivered.len(), 1);
        assert_eq!(redelivered[0].receive_count, 2);
    }

    #[tokio::test]
    async fn test_poll_oldest_first_with_batch_bound() {
        let queue = SqliteQueue::new(test_pool().await);
        let mut sent = Vec::new();
        for _ in 0..5 {
            sent.push(queue.send(&event()).await.unwrap());
        }

        let batch = queue.poll(3, Duration::from_secs(30)).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].id, sent[0]);
        assert_eq!(batch[2].id, sent[2]);
    }

    #[tokio::test]
    async fn test_delayed_message_hidden_until_due() {
        let queue = SqliteQueue::new(test_pool().await);
        queue
            .send_delayed(&event(), Duration::from_millis(80))
            .await
            .unwrap();

        assert!(queue.poll(10, Duration::from_secs(1)).await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(queue.poll(10, Duration::from_secs(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_poisoned_message_moves_to_archive() {
        let queue = SqliteQueue::new(test_pool().await).with_max_receive_count(2);
        queue.send(&event()).await.unwrap();

        // Two deliveries, never acknowledged.
        for _ in 0..2 {
            let batch = queue.poll(10, Duration::from_millis(10)).await.unwrap();
            assert_eq!(batch.len(), 1);
            tokio::time::sleep(Duration::from_millis(40)).await;
        }

        // Third poll archives instead of delivering.
        assert!(queue.poll(10, Duration::from_secs(30)).await.unwrap().is_empty());

        let row = sqlx::query("SELECT receive_count, reason FROM queue_archive")
            .fetch_one(&queue.pool.reader)
            .await
            .unwrap();
        let receive_count: i32 = row.try_get("receive_count").unwrap();
        let reason: String = row.try_get("reason").unwrap();
        assert_eq!(receive_count, 2);
        assert_eq!(reason, "max_receive_count_exceeded");

        // And the live queue is empty for good.
        let remaining = sqlx::query("SELECT COUNT(*) AS n FROM queue_messages")
            .fetch_one(&queue.pool.reader)
            .await
            .unwrap();
        let n: i64 = remaining.try_get("n").unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_leased_message_not_archived_early() {
        let queue = SqliteQueue::new(test_pool().await).with_max_receive_count(1);
        queue.send(&event()).await.unwrap();

        // First delivery puts receive_count at the threshold, but the lease
        // is still live so archival must wait for expiry.
        let batch = queue.poll(10, Duration::from_secs(30)).await.unwrap();
        assert_eq!(batch.len(), 1);

        queue.poll(10, Duration::from_secs(30)).await.unwrap();
        let archived = sqlx::query("SELECT COUNT(*) AS n FROM queue_archive")
            .fetch_one(&queue.pool.reader)
            .await
            .unwrap();
        let n: i64 = archived.try_get("n").unwrap();
        assert_eq!(n, 0);

        // Acknowledged in time: never archived.
        queue.acknowledge(&[batch[0].id]).await.unwrap();
    }

    #[tokio::test]
    async fn test_acknowledge_empty_batch_is_noop() {
        let queue = SqliteQueue::new(test_pool().await);
        queue.acknowledge(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_message_ids_survive_restart_ordering() {
        // AUTOINCREMENT ids stay monotone across delete/re-insert.
        let queue = SqliteQueue::new(test_pool().await);
        let first = queue.send(&event()).await.unwrap();
        queue.acknowledge(&[first]).await.unwrap();

        let second = queue.send(&event()).await.unwrap();
        assert!(second.0 > first.0);
    }
}
