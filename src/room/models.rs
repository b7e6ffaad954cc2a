use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

const PRIVATE_PREFIX: &str = "private_";

/// Database model for rooms table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct RoomModel {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl RoomModel {
    pub fn new_group(name: String) -> Self {
        Self::new(name, false)
    }

    /// A private room named after its two members
    pub fn new_private(user_a: &str, user_b: &str) -> Self {
        Self::new(private_room_name(user_a, user_b), true)
    }

    fn new(name: String, is_private: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            is_private,
            created_at: Utc::now(),
        }
    }
}

/// Deterministic private room name: usernames sorted and joined, so argument order never matters
pub fn private_room_name(user_a: &str, user_b: &str) -> String {
    let mut names = [user_a, user_b];
    names.sort_unstable();
    format!("{}{}", PRIVATE_PREFIX, names.join("_"))
}

/// Names under the private prefix belong to private chats only
pub fn is_reserved_room_name(name: &str) -> bool {
    name.starts_with(PRIVATE_PREFIX)
}
