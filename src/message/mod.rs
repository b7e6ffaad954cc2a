// Message store gateway: append and bounded history reads
pub use models::MessageModel;
pub use repository::{load_history, MessageRepository, MAX_HISTORY_LIMIT};

pub mod models;
pub mod repository;
