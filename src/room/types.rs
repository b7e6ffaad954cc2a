use serde::{Deserialize, Serialize};

use super::models::RoomModel;
use crate::message::MessageModel;

/// Request payload for creating a group room
#[derive(Debug, Deserialize)]
pub struct RoomCreateRequest {
    pub room_name: String,
}

/// Room information returned by the room endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomResponse {
    pub id: String,
    pub name: String,
    pub is_private: bool,
}

impl From<RoomModel> for RoomResponse {
    fn from(room: RoomModel) -> Self {
        Self {
            id: room.id,
            name: room.name,
            is_private: room.is_private,
        }
    }
}

/// Everything the index page shows for the current user
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomIndexResponse {
    pub public_rooms: Vec<RoomResponse>,
    pub private_rooms: Vec<RoomResponse>,
    pub other_users: Vec<String>,
}

/// A history entry as shown on the room page
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub username: String,
    pub message: String,
    pub timestamp: String,
}

impl From<MessageModel> for HistoryEntry {
    fn from(message: MessageModel) -> Self {
        Self {
            timestamp: message.time_label(),
            username: message.sender,
            message: message.content,
        }
    }
}

/// Room page: the room, its recent history oldest first, and who is connected now
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomDetailResponse {
    pub room: RoomResponse,
    pub messages: Vec<HistoryEntry>,
    pub online_users: Vec<String>,
}
