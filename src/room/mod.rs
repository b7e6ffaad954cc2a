// Public API - what other modules can use
pub use handlers::{create_group_room, get_room, list_rooms, start_private_room};
pub use service::RoomDirectory;

// Internal modules
mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod types;
