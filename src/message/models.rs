use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A persisted chat message; immutable once appended
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct MessageModel {
    /// Append sequence, increasing within the store
    pub id: i64,
    pub room_id: String,
    pub sender: String,
    pub content: String,
    /// Server-assigned at append time
    pub created_at: DateTime<Utc>,
}

impl MessageModel {
    /// Hour and minute label used when replaying history
    pub fn time_label(&self) -> String {
        self.created_at.format("%H:%M").to_string()
    }
}
