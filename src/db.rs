use sqlx::PgPool;
use tracing::{info, instrument};

use crate::shared::AppError;

/// Idempotent schema statements, applied in order
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username VARCHAR(150) NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS login_sessions (
        id TEXT PRIMARY KEY,
        username VARCHAR(150) NOT NULL REFERENCES users (username) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS rooms (
        id TEXT PRIMARY KEY,
        name VARCHAR(255) NOT NULL UNIQUE,
        is_private BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS room_members (
        room_id TEXT NOT NULL REFERENCES rooms (id) ON DELETE CASCADE,
        username VARCHAR(150) NOT NULL REFERENCES users (username) ON DELETE CASCADE,
        PRIMARY KEY (room_id, username)
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id BIGSERIAL PRIMARY KEY,
        room_id TEXT NOT NULL REFERENCES rooms (id) ON DELETE CASCADE,
        sender VARCHAR(150) NOT NULL REFERENCES users (username) ON DELETE CASCADE,
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS messages_room_recent_idx ON messages (room_id, id DESC)",
];

/// Creates the chat tables if they do not exist yet
#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &PgPool) -> Result<(), AppError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!(statements = SCHEMA.len(), "Database schema ready");
    Ok(())
}
