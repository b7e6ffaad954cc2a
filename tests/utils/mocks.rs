#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::{mpsc, Mutex};

use roomchat::{AppError, CloseReason, MessageModel, MessageRepository, SocketError, SocketWrapper};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Server side of an in-process socket pair
pub struct MockSocket {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
    closed_with: Arc<Mutex<Option<CloseReason>>>,
}

/// Client side of an in-process socket pair
pub struct MockPeer {
    /// Dropping this sender is the client closing the connection
    pub to_server: Option<mpsc::UnboundedSender<String>>,
    /// Yields `None` once the server dropped its socket
    pub from_server: mpsc::UnboundedReceiver<String>,
    pub closed_with: Arc<Mutex<Option<CloseReason>>>,
}

pub fn mock_socket() -> (MockSocket, MockPeer) {
    let (to_server, inbound) = mpsc::unbounded_channel();
    let (outbound, from_server) = mpsc::unbounded_channel();
    let closed_with = Arc::new(Mutex::new(None));

    (
        MockSocket {
            inbound,
            outbound,
            closed_with: Arc::clone(&closed_with),
        },
        MockPeer {
            to_server: Some(to_server),
            from_server,
            closed_with,
        },
    )
}

#[async_trait]
impl SocketWrapper for MockSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.outbound
            .send(message)
            .map_err(|_| SocketError::ConnectionClosed)
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), SocketError> {
        *self.closed_with.lock().await = Some(reason);
        Ok(())
    }
}

/// Message store whose appends always fail
#[derive(Default)]
pub struct FailingMessageRepository {
    attempts: AtomicUsize,
}

impl FailingMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageRepository for FailingMessageRepository {
    async fn append(
        &self,
        _room_id: &str,
        _sender: &str,
        _content: &str,
    ) -> Result<MessageModel, AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::PersistenceFailure("store unavailable".to_string()))
    }

    async fn recent_messages(
        &self,
        _room_id: &str,
        _limit: i64,
    ) -> Result<Vec<MessageModel>, AppError> {
        Ok(vec![])
    }
}
