#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::{json, Value};
use std::time::Duration;
use tokio::task::JoinHandle;

use roomchat::{CloseCause, CloseReason};

use super::mocks::MockPeer;

/// How long to wait for an event that should arrive
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);
/// How long to wait before concluding nothing is coming
pub const SILENCE_WINDOW: Duration = Duration::from_millis(100);

// ============================================================================
// Client Actions
// ============================================================================

/// A connected test client driving one `ChatSession` through a mock socket
pub struct TestClient {
    peer: MockPeer,
    session: Option<JoinHandle<CloseCause>>,
}

impl TestClient {
    pub fn new(peer: MockPeer, session: JoinHandle<CloseCause>) -> Self {
        Self {
            peer,
            session: Some(session),
        }
    }

    /// Send a raw text frame
    pub fn send_text(&self, text: &str) {
        self.peer
            .to_server
            .as_ref()
            .expect("client already disconnected")
            .send(text.to_string())
            .expect("session is gone");
    }

    /// Send a chat frame with a client timestamp
    pub fn send_chat(&self, message: &str, timestamp: &str) {
        self.send_text(&json!({ "message": message, "timestamp": timestamp }).to_string());
    }

    /// Next event from the server; `None` once the session has dropped the socket
    pub async fn next_event(&mut self) -> Option<Value> {
        let frame = tokio::time::timeout(EVENT_TIMEOUT, self.peer.from_server.recv())
            .await
            .expect("timed out waiting for a server event")?;
        Some(serde_json::from_str(&frame).expect("server sent invalid JSON"))
    }

    /// Raw next frame, waiting indefinitely
    pub async fn next_frame(&mut self) -> Option<String> {
        self.peer.from_server.recv().await
    }

    /// Everything the server sends until it drops the socket
    pub async fn drain(&mut self) -> Vec<Value> {
        let mut events = vec![];
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    /// Consumes events up to and including the given presence event
    pub async fn skip_until_presence(&mut self, username: &str, status: &str) {
        loop {
            let event = self
                .next_event()
                .await
                .unwrap_or_else(|| panic!("socket closed before {} went {}", username, status));
            if event["type"] == "user_presence"
                && event["username"] == username
                && event["status"] == status
            {
                return;
            }
        }
    }

    /// Client closes the connection; waits for the session to finish
    pub async fn disconnect(mut self) -> CloseCause {
        self.peer.to_server = None;
        self.finished().await
    }

    /// Waits for the session task to end on its own
    pub async fn finished(&mut self) -> CloseCause {
        let session = self.session.take().expect("session already awaited");
        tokio::time::timeout(EVENT_TIMEOUT, session)
            .await
            .expect("session did not finish")
            .expect("session task panicked")
    }

    /// The close frame the server sent, if any
    pub async fn close_reason(&self) -> Option<CloseReason> {
        *self.peer.closed_with.lock().await
    }
}
