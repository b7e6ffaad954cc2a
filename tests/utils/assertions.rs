//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;

use super::actions::{TestClient, SILENCE_WINDOW};

// ============================================================================
// Assertion Helpers
// ============================================================================

impl TestClient {
    /// Assert the next event is a chat message with these fields
    pub async fn received_chat(&mut self, username: &str, message: &str, timestamp: &str) {
        let event = self.expect_event().await;
        assert_chat(&event, username, message);
        assert_eq!(event["timestamp"], timestamp, "wrong timestamp in {}", event);
    }

    /// Assert the next event is a presence change
    pub async fn received_presence(&mut self, username: &str, status: &str) {
        let event = self.expect_event().await;
        assert_eq!(event["type"], "user_presence", "unexpected event {}", event);
        assert_eq!(event["username"], username, "wrong user in {}", event);
        assert_eq!(event["status"], status, "wrong status in {}", event);
    }

    /// Assert nothing arrives within a short window (a closed socket also counts)
    pub async fn received_nothing(&mut self) {
        if let Ok(Some(frame)) = tokio::time::timeout(SILENCE_WINDOW, self.next_frame()).await {
            panic!("expected no event, got {}", frame);
        }
    }

    async fn expect_event(&mut self) -> Value {
        self.next_event()
            .await
            .expect("socket closed while waiting for an event")
    }
}

pub fn assert_chat(event: &Value, username: &str, message: &str) {
    assert_eq!(event["type"], "chat_message", "unexpected event {}", event);
    assert_eq!(event["username"], username, "wrong sender in {}", event);
    assert_eq!(event["message"], message, "wrong message in {}", event);
}

/// History timestamps are server-assigned `HH:MM` labels
pub fn assert_time_label(event: &Value) {
    let label = event["timestamp"].as_str().expect("timestamp is a string");
    assert_eq!(label.len(), 5, "bad time label {}", label);
    assert_eq!(&label[2..3], ":", "bad time label {}", label);
    assert!(label[..2].chars().chain(label[3..].chars()).all(|c| c.is_ascii_digit()));
}
