use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

use super::models::MessageModel;
use crate::shared::AppError;

/// Durable message store: append plus bounded newest-first reads
#[async_trait]
pub trait MessageRepository {
    /// Persists a message and assigns its timestamp. Failures are `PersistenceFailure`.
    async fn append(
        &self,
        room_id: &str,
        sender: &str,
        content: &str,
    ) -> Result<MessageModel, AppError>;

    /// Up to `limit` most recent messages of the room, newest first
    async fn recent_messages(
        &self,
        room_id: &str,
        limit: i64,
    ) -> Result<Vec<MessageModel>, AppError>;
}

/// Hard cap on replayed history, whatever the configured limit says
pub const MAX_HISTORY_LIMIT: i64 = 50;

/// Up to `limit` most recent messages ordered oldest first, ready for replay.
/// `limit` is capped at `MAX_HISTORY_LIMIT`.
pub async fn load_history(
    repository: &(dyn MessageRepository + Send + Sync),
    room_id: &str,
    limit: i64,
) -> Result<Vec<MessageModel>, AppError> {
    let limit = limit.min(MAX_HISTORY_LIMIT);
    let mut messages = repository.recent_messages(room_id, limit).await?;
    messages.reverse();
    Ok(messages)
}

#[derive(Default)]
struct MessageLog {
    next_id: i64,
    last_timestamp: Option<DateTime<Utc>>,
    rooms: HashMap<String, Vec<MessageModel>>,
}

/// In-memory implementation of MessageRepository for development and testing
#[derive(Default)]
pub struct InMemoryMessageRepository {
    log: Mutex<MessageLog>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages stored for a room
    pub async fn message_count(&self, room_id: &str) -> usize {
        self.log
            .lock()
            .await
            .rooms
            .get(room_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    #[instrument(skip(self, content))]
    async fn append(
        &self,
        room_id: &str,
        sender: &str,
        content: &str,
    ) -> Result<MessageModel, AppError> {
        let mut log = self.log.lock().await;

        // Wall clock may step backwards; stored timestamps never do
        let now = Utc::now();
        let created_at = match log.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        log.last_timestamp = Some(created_at);
        log.next_id += 1;

        let message = MessageModel {
            id: log.next_id,
            room_id: room_id.to_string(),
            sender: sender.to_string(),
            content: content.to_string(),
            created_at,
        };
        log.rooms
            .entry(room_id.to_string())
            .or_default()
            .push(message.clone());

        debug!(message_id = message.id, "Message appended in memory");
        Ok(message)
    }

    #[instrument(skip(self))]
    async fn recent_messages(
        &self,
        room_id: &str,
        limit: i64,
    ) -> Result<Vec<MessageModel>, AppError> {
        let log = self.log.lock().await;
        let limit = usize::try_from(limit).unwrap_or(0);

        Ok(log
            .rooms
            .get(room_id)
            .map(|messages| messages.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// PostgreSQL implementation of the message store
pub struct PostgresMessageRepository {
    pool: PgPool,
}

impl PostgresMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    #[instrument(skip(self, content))]
    async fn append(
        &self,
        room_id: &str,
        sender: &str,
        content: &str,
    ) -> Result<MessageModel, AppError> {
        let row = sqlx::query(
            "INSERT INTO messages (room_id, sender, content) VALUES ($1, $2, $3) \
             RETURNING id, created_at",
        )
        .bind(room_id)
        .bind(sender)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, room_id = %room_id, "Failed to append message");
            AppError::PersistenceFailure(e.to_string())
        })?;

        Ok(MessageModel {
            id: row.get("id"),
            room_id: room_id.to_string(),
            sender: sender.to_string(),
            content: content.to_string(),
            created_at: row.get("created_at"),
        })
    }

    #[instrument(skip(self))]
    async fn recent_messages(
        &self,
        room_id: &str,
        limit: i64,
    ) -> Result<Vec<MessageModel>, AppError> {
        let rows = sqlx::query(
            "SELECT id, room_id, sender, content, created_at FROM messages \
             WHERE room_id = $1 ORDER BY id DESC LIMIT $2",
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| MessageModel {
                id: row.get("id"),
                room_id: row.get("room_id"),
                sender: row.get("sender"),
                content: row.get("content"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
