use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{
    messages::{ClientMessage, PresenceStatus, ServerEvent},
    registry::ConnectionId,
    socket::{CloseReason, SocketError, SocketWrapper},
};
use crate::{
    message::load_history,
    room::models::RoomModel,
    shared::{AppError, AppState},
};

/// Lifecycle of one chat connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Joining,
    Active,
    Closing,
    Closed,
}

/// Why a session ended
#[derive(Debug)]
pub enum CloseCause {
    /// Authentication or room resolution failed before the session went active
    Rejected(AppError),
    /// The client sent a close frame or the stream ended
    ClientClosed,
    /// Reading from or writing to the socket failed
    Transport(SocketError),
    /// The registry dropped this session's outbound queue
    ServerShutdown,
}

impl CloseCause {
    fn close_reason(&self) -> CloseReason {
        match self {
            CloseCause::Rejected(e) => CloseReason {
                code: e.close_code(),
                reason: e.close_reason(),
            },
            CloseCause::ServerShutdown => CloseReason::GOING_AWAY,
            CloseCause::ClientClosed | CloseCause::Transport(_) => CloseReason::NORMAL,
        }
    }
}

/// Protocol driver for one connection: authenticate, join, replay, relay, tear down.
///
/// The session owns its socket; the only state it shares with other sessions goes through
/// the room registry. Inbound frames are handled one at a time, so a sender's messages are
/// persisted and broadcast in the order they arrive.
pub struct ChatSession {
    id: ConnectionId,
    room_name: String,
    token: Option<String>,
    socket: Box<dyn SocketWrapper>,
    app_state: AppState,
    state: SessionState,
    username: Option<String>,
    room: Option<RoomModel>,
}

impl ChatSession {
    /// `socket` must already be upgraded; the token is checked in `run`
    pub fn new(
        id: ConnectionId,
        room_name: String,
        token: Option<String>,
        socket: Box<dyn SocketWrapper>,
        app_state: AppState,
    ) -> Self {
        Self {
            id,
            room_name,
            token,
            socket,
            app_state,
            state: SessionState::Connecting,
            username: None,
            room: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session to completion
    pub async fn run(mut self) -> CloseCause {
        let cause = self.drive().await;
        self.teardown(&cause).await;
        cause
    }

    async fn drive(&mut self) -> CloseCause {
        self.transition(SessionState::Authenticating);
        let authenticator = self.app_state.authenticator();
        let username = match authenticator.authenticate(self.token.as_deref()).await {
            Ok(claims) => claims.username,
            Err(e) => {
                warn!(
                    connection_id = %self.id,
                    room_name = %self.room_name,
                    error = %e,
                    "Chat session rejected: unauthenticated"
                );
                return CloseCause::Rejected(e);
            }
        };
        self.username = Some(username.clone());

        self.transition(SessionState::Joining);
        let room = match resolve_room(&self.app_state, &self.room_name, &username).await {
            Ok(room) => room,
            Err(e) => {
                warn!(
                    connection_id = %self.id,
                    room_name = %self.room_name,
                    username = %username,
                    error = %e,
                    "Chat session rejected while joining"
                );
                return CloseCause::Rejected(e);
            }
        };
        self.room = Some(room.clone());

        // The registry keeps the only sender; once it lets go, recv() yields None
        let (outbound_sender, mut outbound_receiver) = mpsc::unbounded_channel::<String>();
        if !self
            .app_state
            .registry
            .register(&room.id, self.id, &username, outbound_sender)
            .await
        {
            return CloseCause::ServerShutdown;
        }

        if let Err(e) = self.replay_history(&room).await {
            return CloseCause::Transport(e);
        }

        broadcast_presence(&self.app_state, &room.id, &username, PresenceStatus::Online).await;

        self.transition(SessionState::Active);
        info!(
            connection_id = %self.id,
            room_id = %room.id,
            room_name = %room.name,
            username = %username,
            "Chat session active"
        );

        self.relay(&mut outbound_receiver, &room.id, &username)
            .await
    }

    /// Sends the recent history to this socket only, oldest first
    async fn replay_history(&mut self, room: &RoomModel) -> Result<(), SocketError> {
        let history = match load_history(
            self.app_state.message_repository.as_ref(),
            &room.id,
            self.app_state.config.history_limit,
        )
        .await
        {
            Ok(history) => history,
            Err(e) => {
                // Joining still succeeds, just without backlog
                error!(room_id = %room.id, error = %e, "Failed to load message history");
                return Ok(());
            }
        };

        debug!(
            connection_id = %self.id,
            room_id = %room.id,
            replayed = history.len(),
            "Replaying message history"
        );

        for message in &history {
            match ServerEvent::history(message).to_json() {
                Ok(payload) => self.socket.send_message(payload).await?,
                Err(e) => warn!(message_id = message.id, error = %e, "Skipping history entry"),
            }
        }
        Ok(())
    }

    async fn relay(
        &mut self,
        outbound_receiver: &mut mpsc::UnboundedReceiver<String>,
        room_id: &str,
        username: &str,
    ) -> CloseCause {
        loop {
            tokio::select! {
                // Handle outbound messages (registry -> client)
                msg = outbound_receiver.recv() => {
                    match msg {
                        Some(payload) => {
                            if let Err(e) = self.socket.send_message(payload).await {
                                return CloseCause::Transport(e);
                            }
                        }
                        None => return CloseCause::ServerShutdown,
                    }
                }

                // Handle inbound messages (client -> room)
                msg = self.socket.receive_message() => {
                    match msg {
                        Ok(Some(text)) => {
                            handle_client_frame(&self.app_state, room_id, username, &text).await
                        }
                        Ok(None) => return CloseCause::ClientClosed,
                        Err(e) => return CloseCause::Transport(e),
                    }
                }
            }
        }
    }

    async fn teardown(&mut self, cause: &CloseCause) {
        self.transition(SessionState::Closing);

        if let Some(room) = self.room.take() {
            self.app_state.registry.deregister(&room.id, self.id).await;

            if let Some(username) = &self.username {
                broadcast_presence(&self.app_state, &room.id, username, PresenceStatus::Offline)
                    .await;
            }
        }

        // The peer may already be gone; a failed close frame changes nothing
        let _ = self.socket.close(cause.close_reason()).await;

        self.transition(SessionState::Closed);
        info!(
            connection_id = %self.id,
            room_name = %self.room_name,
            username = ?self.username,
            cause = ?cause,
            "Chat session closed"
        );
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            connection_id = %self.id,
            from = ?self.state,
            to = ?next,
            "Session state transition"
        );
        self.state = next;
    }
}

async fn resolve_room(
    app_state: &AppState,
    room_name: &str,
    username: &str,
) -> Result<RoomModel, AppError> {
    let directory = &app_state.room_directory;
    let room = directory.resolve_room(room_name).await?;
    directory.ensure_access(&room, username).await?;
    Ok(room)
}

/// Errors here are scoped to the one frame; the session stays active
async fn handle_client_frame(app_state: &AppState, room_id: &str, username: &str, text: &str) {
    match relay_chat_message(app_state, room_id, username, text).await {
        Ok(delivered) => {
            debug!(room_id = %room_id, username = %username, delivered, "Chat message relayed");
        }
        Err(AppError::MalformedPayload(reason)) => {
            warn!(
                room_id = %room_id,
                username = %username,
                reason = %reason,
                "Dropping malformed client frame"
            );
        }
        Err(AppError::PersistenceFailure(reason)) => {
            error!(
                room_id = %room_id,
                username = %username,
                reason = %reason,
                "Chat message dropped: not persisted"
            );
        }
        Err(e) => {
            error!(
                room_id = %room_id,
                username = %username,
                error = %e,
                "Chat message stored but not broadcast"
            );
        }
    }
}

/// Persist first, then broadcast; a message never reaches the room before it is stored
async fn relay_chat_message(
    app_state: &AppState,
    room_id: &str,
    username: &str,
    text: &str,
) -> Result<usize, AppError> {
    let inbound = ClientMessage::parse(text)?;

    app_state
        .message_repository
        .append(room_id, username, &inbound.message)
        .await
        .map_err(|e| match e {
            AppError::PersistenceFailure(_) => e,
            other => AppError::PersistenceFailure(other.to_string()),
        })?;

    let event = ServerEvent::chat(inbound.message, username.to_string(), inbound.timestamp);
    app_state.broadcaster.broadcast(room_id, &event).await
}

async fn broadcast_presence(
    app_state: &AppState,
    room_id: &str,
    username: &str,
    status: PresenceStatus,
) {
    let event = ServerEvent::presence(username.to_string(), status);
    if let Err(e) = app_state.broadcaster.broadcast(room_id, &event).await {
        warn!(room_id = %room_id, error = %e, "Failed to broadcast presence");
    }
}
