use serde::{Deserialize, Serialize};
use tracing::error;

use crate::message::MessageModel;
use crate::shared::AppError;

/// Presence state carried by `user_presence` events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Server -> client events. The `type` tag selects the variant on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    ChatMessage {
        message: String,
        username: String,
        timestamp: String,
    },
    UserPresence {
        username: String,
        status: PresenceStatus,
    },
}

impl ServerEvent {
    pub fn chat(message: String, username: String, timestamp: String) -> Self {
        ServerEvent::ChatMessage {
            message,
            username,
            timestamp,
        }
    }

    /// Replayed history entry, stamped with its stored time
    pub fn history(message: &MessageModel) -> Self {
        ServerEvent::ChatMessage {
            message: message.content.clone(),
            username: message.sender.clone(),
            timestamp: message.time_label(),
        }
    }

    pub fn presence(username: String, status: PresenceStatus) -> Self {
        ServerEvent::UserPresence { username, status }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::ChatMessage { .. } => "chat_message",
            ServerEvent::UserPresence { .. } => "user_presence",
        }
    }

    /// A failure here is the server's fault, never the client's
    pub fn to_json(&self) -> Result<String, AppError> {
        serialize(self)
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(|e| {
        error!(error = %e, "Failed to serialize server event");
        AppError::Internal
    })
}

/// Client -> server chat frame: `{"message": str, "timestamp"?: str}`
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMessage {
    pub message: String,
    /// Client clock label, empty when not supplied
    pub timestamp: String,
}

impl ClientMessage {
    /// Fails with `MalformedPayload` unless `message` is present and a string.
    /// A non-string timestamp is treated as absent.
    pub fn parse(text: &str) -> Result<Self, AppError> {
        let frame: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| AppError::MalformedPayload(format!("Invalid JSON frame: {}", e)))?;
        let fields = frame.as_object().ok_or_else(|| {
            AppError::MalformedPayload("Frame must be a JSON object".to_string())
        })?;

        let message = match fields.get("message") {
            Some(serde_json::Value::String(message)) => message.clone(),
            Some(_) => {
                return Err(AppError::MalformedPayload(
                    "Field `message` must be a string".to_string(),
                ))
            }
            None => {
                return Err(AppError::MalformedPayload(
                    "Missing field `message`".to_string(),
                ))
            }
        };

        let timestamp = match fields.get("timestamp") {
            Some(serde_json::Value::String(timestamp)) => timestamp.clone(),
            _ => String::new(),
        };

        Ok(Self { message, timestamp })
    }
}
