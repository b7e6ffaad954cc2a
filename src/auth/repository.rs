use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::{LoginSessionModel, UserModel};
use crate::shared::AppError;

/// Storage for user accounts and their login sessions
#[async_trait]
pub trait AccountRepository {
    /// Fails with `Conflict` when the username is taken
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError>;
    async fn get_user(&self, username: &str) -> Result<Option<UserModel>, AppError>;
    /// All users ordered by username
    async fn list_users(&self) -> Result<Vec<UserModel>, AppError>;

    async fn create_login_session(&self, session: &LoginSessionModel) -> Result<(), AppError>;
    async fn get_login_session(
        &self,
        session_id: &str,
    ) -> Result<Option<LoginSessionModel>, AppError>;
    async fn delete_login_session(&self, session_id: &str) -> Result<(), AppError>;
}

/// In-memory implementation of AccountRepository for development and testing
#[derive(Default)]
pub struct InMemoryAccountRepository {
    users: Mutex<HashMap<String, UserModel>>,
    login_sessions: Mutex<HashMap<String, LoginSessionModel>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    #[instrument(skip(self, user))]
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError> {
        let mut users = self.users.lock().await;
        if users.contains_key(&user.username) {
            warn!(username = %user.username, "Username already taken");
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
        users.insert(user.username.clone(), user.clone());

        debug!(username = %user.username, "User created in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_user(&self, username: &str) -> Result<Option<UserModel>, AppError> {
        Ok(self.users.lock().await.get(username).cloned())
    }

    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<UserModel>, AppError> {
        let mut users: Vec<UserModel> = self.users.lock().await.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    #[instrument(skip(self, session))]
    async fn create_login_session(&self, session: &LoginSessionModel) -> Result<(), AppError> {
        let mut sessions = self.login_sessions.lock().await;
        if sessions.contains_key(&session.id) {
            return Err(AppError::DatabaseError(
                "Login session already exists".to_string(),
            ));
        }
        sessions.insert(session.id.clone(), session.clone());

        debug!(session_id = %session.id, username = %session.username, "Login session stored in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_login_session(
        &self,
        session_id: &str,
    ) -> Result<Option<LoginSessionModel>, AppError> {
        Ok(self.login_sessions.lock().await.get(session_id).cloned())
    }

    #[instrument(skip(self))]
    async fn delete_login_session(&self, session_id: &str) -> Result<(), AppError> {
        if self.login_sessions.lock().await.remove(session_id).is_none() {
            warn!(session_id = %session_id, "Login session not found for deletion");
            return Err(AppError::NotFound("Login session not found".to_string()));
        }
        Ok(())
    }
}

/// PostgreSQL implementation of the account repository
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserModel {
    UserModel {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    #[instrument(skip(self, user))]
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError> {
        let result = sqlx::query(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create user in database");
            AppError::DatabaseError(e.to_string())
        })?;

        if result.rows_affected() == 0 {
            warn!(username = %user.username, "Username already taken");
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        debug!(username = %user.username, "User created in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_user(&self, username: &str) -> Result<Option<UserModel>, AppError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<UserModel>, AppError> {
        let rows = sqlx::query(
            "SELECT id, username, password_hash, created_at FROM users ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    #[instrument(skip(self, session))]
    async fn create_login_session(&self, session: &LoginSessionModel) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO login_sessions (id, username, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&session.id)
        .bind(&session.username)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create login session in database");
            AppError::DatabaseError(e.to_string())
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_login_session(
        &self,
        session_id: &str,
    ) -> Result<Option<LoginSessionModel>, AppError> {
        let row = sqlx::query(
            "SELECT id, username, created_at, expires_at FROM login_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| LoginSessionModel {
            id: row.get("id"),
            username: row.get("username"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        }))
    }

    #[instrument(skip(self))]
    async fn delete_login_session(&self, session_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM login_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!(session_id = %session_id, "Login session not found for deletion");
            return Err(AppError::NotFound("Login session not found".to_string()));
        }
        Ok(())
    }
}
