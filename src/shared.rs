use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::{repository::AccountRepository, service::AuthService, Authenticator};
use crate::config::ServerConfig;
use crate::message::repository::MessageRepository;
use crate::room::{repository::RoomRepository, service::RoomDirectory};
use crate::websockets::{Broadcaster, InMemoryRoomRegistry, RoomRegistry};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub auth_service: Arc<AuthService>,
    pub room_directory: Arc<RoomDirectory>,
    pub message_repository: Arc<dyn MessageRepository + Send + Sync>,
    pub registry: Arc<dyn RoomRegistry>,
    pub broadcaster: Broadcaster,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        account_repository: Arc<dyn AccountRepository + Send + Sync>,
        room_repository: Arc<dyn RoomRepository + Send + Sync>,
        message_repository: Arc<dyn MessageRepository + Send + Sync>,
    ) -> Self {
        let auth_service = Arc::new(AuthService::new(
            Arc::clone(&account_repository),
            config.token_config(),
            config.bcrypt_cost,
        ));
        let room_directory = Arc::new(RoomDirectory::new(room_repository, account_repository));
        let registry: Arc<dyn RoomRegistry> = Arc::new(InMemoryRoomRegistry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));

        Self {
            config,
            auth_service,
            room_directory,
            message_repository,
            registry,
            broadcaster,
        }
    }

    /// Builds a state backed entirely by in-memory repositories
    pub fn in_memory(config: ServerConfig) -> Self {
        use crate::auth::repository::InMemoryAccountRepository;
        use crate::message::repository::InMemoryMessageRepository;
        use crate::room::repository::InMemoryRoomRepository;

        Self::new(
            config,
            Arc::new(InMemoryAccountRepository::new()),
            Arc::new(InMemoryRoomRepository::new()),
            Arc::new(InMemoryMessageRepository::new()),
        )
    }

    /// The authenticator consulted by every chat session after the upgrade
    pub fn authenticator(&self) -> Arc<dyn Authenticator> {
        self.auth_service.clone()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    /// WebSocket close code sent when this error ends a chat session
    pub fn close_code(&self) -> u16 {
        match self {
            AppError::JwtError(_) | AppError::Unauthorized(_) => 4401,
            AppError::Forbidden(_) => 4403,
            AppError::RoomNotFound(_) | AppError::NotFound(_) => 4404,
            AppError::BadRequest(_) | AppError::MalformedPayload(_) => 4400,
            _ => 1011,
        }
    }

    /// Short close reason matching the close code
    pub fn close_reason(&self) -> &'static str {
        match self.close_code() {
            4401 => "unauthenticated",
            4403 => "forbidden",
            4404 => "room not found",
            4400 => "bad request",
            _ => "internal error",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::DatabaseError(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::JwtError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::RoomNotFound(name) => {
                (StatusCode::NOT_FOUND, format!("Room not found: {}", name))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) | AppError::MalformedPayload(msg) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::PersistenceFailure(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Persistence failure: {}", msg),
            ),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

/// Room names and usernames are restricted to word characters
pub fn is_word(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_alphanumeric() || c == '_')
}
