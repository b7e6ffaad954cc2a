use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for the users table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserModel {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserModel {
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// Server-side record of a login; the JWT carries its id so logout can revoke it
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LoginSessionModel {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LoginSessionModel {
    pub fn new(username: String, expiration_days: i64) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            username,
            created_at: now,
            expires_at: now + chrono::Duration::days(expiration_days),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
