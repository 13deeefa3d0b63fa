use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{
    check_message_size, check_visibility_timeout, clamp_batch, QueueStore, ReceivedMessage, StorageError,
    StorageResult,
};

/// Queue storage on SQLite.
///
/// A receive claims a message by moving its `visible_at` into the future and
/// stamping a new pop receipt. The claim is a conditional update, so two
/// concurrent receivers never get the same message.
#[derive(Clone)]
pub struct SqliteQueueStore {
    pool: SqlitePool,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl SqliteQueueStore {
    pub async fn open(pool: SqlitePool) -> StorageResult<Self> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS storage_queues (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            )"#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS storage_messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                queue_name TEXT NOT NULL,
                body TEXT NOT NULL,
                inserted_at INTEGER NOT NULL,
                visible_at INTEGER NOT NULL,
                pop_receipt TEXT NULL,
                dequeue_count INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY(queue_name) REFERENCES storage_queues(name) ON DELETE CASCADE
            )"#,
        )
        .execute(&pool)
        .await?;

        if let Err(e) = sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_storage_messages_visible ON storage_messages(queue_name, visible_at, seq)",
        )
        .execute(&pool)
        .await
        {
            tracing::warn!("Failed to create index idx_storage_messages_visible: {}", e);
        }

        Ok(Self { pool })
    }

    async fn queue_exists(&self, queue: &str) -> StorageResult<bool> {
        let row = sqlx::query("SELECT 1 FROM storage_queues WHERE name = ?1")
            .bind(queue)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn create_queue_if_not_exists(&self, queue: &str) -> StorageResult<()> {
        sqlx::query("INSERT OR IGNORE INTO storage_queues (name) VALUES (?1)")
            .bind(queue)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn send_message(&self, queue: &str, text: &str) -> StorageResult<String> {
        check_message_size(text)?;
        if !self.queue_exists(queue).await? {
            return Err(StorageError::not_found("queue", queue));
        }
        let id = Uuid::new_v4().to_string();
        let now = now_millis();
        sqlx::query(
            r#"INSERT INTO storage_messages (id, queue_name, body, inserted_at, visible_at)
               VALUES (?1, ?2, ?3, ?4, ?4)"#,
        )
        .bind(&id)
        .bind(queue)
        .bind(text)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn receive_messages(
        &self,
        queue: &str,
        max: usize,
        visibility_timeout: Duration,
    ) -> StorageResult<Vec<ReceivedMessage>> {
        check_visibility_timeout(visibility_timeout)?;
        if !self.queue_exists(queue).await? {
            return Err(StorageError::not_found("queue", queue));
        }
        let now = now_millis();
        let hidden_until = i64::try_from(visibility_timeout.as_millis())
            .ok()
            .and_then(|ms| now.checked_add(ms))
            .ok_or_else(|| StorageError::InvalidInput("visibility timeout out of range".into()))?;
        let candidates = sqlx::query(
            r#"SELECT id, body, dequeue_count FROM storage_messages
               WHERE queue_name = ?1 AND visible_at <= ?2
               ORDER BY seq
               LIMIT ?3"#,
        )
        .bind(queue)
        .bind(now)
        .bind(clamp_batch(max) as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut claimed = Vec::with_capacity(candidates.len());
        for row in candidates {
            let id: String = row.try_get("id")?;
            let pop_receipt = Uuid::new_v4().to_string();
            let updated = sqlx::query(
                r#"UPDATE storage_messages
                   SET visible_at = ?1, pop_receipt = ?2, dequeue_count = dequeue_count + 1
                   WHERE id = ?3 AND visible_at <= ?4"#,
            )
            .bind(hidden_until)
            .bind(&pop_receipt)
            .bind(&id)
            .bind(now)
            .execute(&self.pool)
            .await?;
            // Another receiver claimed it between the select and the update
            if updated.rows_affected() == 0 {
                continue;
            }
            let dequeue_count: i64 = row.try_get("dequeue_count")?;
            claimed.push(ReceivedMessage {
                id,
                text: row.try_get("body")?,
                pop_receipt,
                dequeue_count: (dequeue_count + 1) as u32,
            });
        }
        Ok(claimed)
    }

    async fn delete_message(&self, queue: &str, id: &str, pop_receipt: &str) -> StorageResult<()> {
        let deleted = sqlx::query(
            "DELETE FROM storage_messages WHERE queue_name = ?1 AND id = ?2 AND pop_receipt = ?3",
        )
        .bind(queue)
        .bind(id)
        .bind(pop_receipt)
        .execute(&self.pool)
        .await?;
        if deleted.rows_affected() == 0 {
            return Err(StorageError::not_found("message", id));
        }
        Ok(())
    }
}
