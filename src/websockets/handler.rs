use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderMap},
    response::Response,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::session::ChatSession;
use crate::auth::bearer_token;
use crate::shared::{is_word, AppError, AppState};

/// Query parameters for the chat socket
#[derive(Debug, Deserialize)]
pub struct ChatSocketQuery {
    pub token: Option<String>,
}

/// Picks the token out of a `Sec-WebSocket-Protocol` list such as `chat, <jwt>`.
/// Prefers the entry shaped like a JWT, otherwise the last one offered.
fn protocol_token(headers: &HeaderMap) -> Option<String> {
    let offered: Vec<&str> = headers
        .get(SEC_WEBSOCKET_PROTOCOL)?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();

    offered
        .iter()
        .find(|entry| entry.split('.').filter(|part| !part.is_empty()).count() == 3)
        .or_else(|| offered.last())
        .map(|entry| entry.to_string())
}

/// GET /ws/chat/:room_name
///
/// The upgrade is accepted before the token is looked at, so an unauthenticated client
/// gets a clean close from the session instead of a refused handshake. The token may
/// arrive as `?token=`, an Authorization Bearer header, or the Sec-WebSocket-Protocol header.
#[instrument(name = "chat_socket", skip(ws, query, headers, state))]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_name): Path<String>,
    Query(query): Query<ChatSocketQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if !is_word(&room_name) {
        warn!(room_name = %room_name, "Rejecting socket for invalid room name");
        return Err(AppError::BadRequest(
            "Room name must be word characters only".to_string(),
        ));
    }

    let mut ws = ws;
    let token = match query
        .token
        .or_else(|| bearer_token(&headers).map(str::to_string))
    {
        Some(token) => Some(token),
        None => {
            let offered = protocol_token(&headers);
            // Browsers fail the handshake unless one offered protocol is echoed back
            if let Some(token) = &offered {
                ws = ws.protocols([token.clone()]);
            }
            offered
        }
    };

    let connection_id = Uuid::new_v4();
    info!(
        connection_id = %connection_id,
        room_name = %room_name,
        has_token = token.is_some(),
        "WebSocket connection requested"
    );

    Ok(ws.on_upgrade(move |socket| async move {
        ChatSession::new(connection_id, room_name, token, Box::new(socket), state)
            .run()
            .await;
    }))
}
