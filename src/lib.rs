// Library crate for the room chat server
// This file exposes the public API for the binary and integration tests

pub mod auth;
pub mod config;
pub mod db;
pub mod message;
pub mod room;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use config::ServerConfig;
pub use message::{MessageModel, MessageRepository};
pub use room::{models::RoomModel, repository::RoomRepository, RoomDirectory};
pub use shared::{AppError, AppState};
pub use websockets::{
    Broadcaster, ChatSession, ClientMessage, CloseCause, CloseReason, InMemoryRoomRegistry,
    PresenceStatus, RoomRegistry, ServerEvent, SessionState, SocketError, SocketWrapper,
};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Builds the HTTP and WebSocket router over `state`
pub fn app(state: AppState) -> Router {
    // Routes that need a valid login session in the Authorization header
    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/rooms", get(room::list_rooms).post(room::create_group_room))
        .route("/rooms/private/:username", post(room::start_private_room))
        .route("/rooms/:room_name", get(room::get_room))
        .layer(middleware::from_fn_with_state(state.clone(), auth::jwt_auth));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // Authenticated after the upgrade, so it stays outside jwt_auth
        .route("/ws/chat/:room_name", get(websockets::websocket_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
