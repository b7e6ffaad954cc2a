#![allow(dead_code)] // Test utilities may not all be used in every test

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use roomchat::{
    auth::{repository::InMemoryAccountRepository, types::CredentialsRequest},
    message::repository::InMemoryMessageRepository,
    room::repository::InMemoryRoomRepository,
    AppState, ChatSession, MessageRepository, RoomModel, ServerConfig,
};

use super::actions::TestClient;
use super::mocks::{mock_socket, FailingMessageRepository};

pub const PASSWORD: &str = "password123";

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub state: AppState,
    /// The live store, unless the setup was built with a failing one
    pub messages: Arc<InMemoryMessageRepository>,
    pub failing_store: Option<Arc<FailingMessageRepository>>,
    tokens: HashMap<String, String>,
}

pub struct TestSetupBuilder {
    users: Vec<String>,
    group_rooms: Vec<String>,
    private_rooms: Vec<(String, String)>,
    failing_store: bool,
    history_limit: Option<i64>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            users: vec![],
            group_rooms: vec![],
            private_rooms: vec![],
            failing_store: false,
            history_limit: None,
        }
    }

    pub fn with_users(mut self, users: &[&str]) -> Self {
        self.users = users.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Group room created by the first user
    pub fn with_group_room(mut self, name: &str) -> Self {
        self.group_rooms.push(name.to_string());
        self
    }

    pub fn with_private_room(mut self, user_a: &str, user_b: &str) -> Self {
        self.private_rooms
            .push((user_a.to_string(), user_b.to_string()));
        self
    }

    /// Set on the config as-is, bypassing the clamp applied to `HISTORY_LIMIT`
    pub fn with_history_limit(mut self, limit: i64) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn with_failing_store(mut self) -> Self {
        self.failing_store = true;
        self
    }

    pub async fn build(self) -> TestSetup {
        let defaults = ServerConfig::default();
        let config = ServerConfig {
            bcrypt_cost: roomchat::config::MIN_BCRYPT_COST,
            history_limit: self.history_limit.unwrap_or(defaults.history_limit),
            ..defaults
        };

        let messages = Arc::new(InMemoryMessageRepository::new());
        let failing_store = self
            .failing_store
            .then(|| Arc::new(FailingMessageRepository::new()));
        let message_repository: Arc<dyn MessageRepository + Send + Sync> = match &failing_store {
            Some(failing) => failing.clone(),
            None => messages.clone(),
        };

        let state = AppState::new(
            config,
            Arc::new(InMemoryAccountRepository::new()),
            Arc::new(InMemoryRoomRepository::new()),
            message_repository,
        );

        let mut tokens = HashMap::new();
        for username in &self.users {
            let response = state
                .auth_service
                .register(CredentialsRequest {
                    username: username.clone(),
                    password: PASSWORD.to_string(),
                })
                .await
                .unwrap();
            tokens.insert(username.clone(), response.token);
        }

        let creator = self.users.first().cloned().unwrap_or_else(|| "admin".to_string());
        for name in &self.group_rooms {
            state
                .room_directory
                .resolve_or_create_group_room(name, &creator)
                .await
                .unwrap();
        }
        for (user_a, user_b) in &self.private_rooms {
            state
                .room_directory
                .get_or_create_private_room(user_a, user_b)
                .await
                .unwrap();
        }

        TestSetup {
            state,
            messages,
            failing_store,
            tokens,
        }
    }
}

impl TestSetup {
    pub fn token(&self, username: &str) -> String {
        self.tokens
            .get(username)
            .cloned()
            .unwrap_or_else(|| panic!("{} was not registered", username))
    }

    pub async fn room(&self, name: &str) -> RoomModel {
        self.state.room_directory.resolve_room(name).await.unwrap()
    }

    /// Starts a session the way the upgrade handler does, with a mock socket
    pub fn connect(&self, room_name: &str, token: Option<String>) -> TestClient {
        let (socket, peer) = mock_socket();
        let session = ChatSession::new(
            Uuid::new_v4(),
            room_name.to_string(),
            token,
            Box::new(socket),
            self.state.clone(),
        );
        TestClient::new(peer, tokio::spawn(session.run()))
    }

    /// Connects `username` and waits until the session is active.
    /// History and the user's own online presence are consumed.
    pub async fn join(&self, username: &str, room_name: &str) -> TestClient {
        let mut client = self.connect(room_name, Some(self.token(username)));
        client.skip_until_presence(username, "online").await;
        client
    }
}
