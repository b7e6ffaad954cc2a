// Public API
pub use broadcast::Broadcaster;
pub use handler::websocket_handler;
pub use messages::{ClientMessage, PresenceStatus, ServerEvent};
pub use registry::{ConnectionId, InMemoryRoomRegistry, OutboundSender, RoomRegistry};
pub use session::{ChatSession, CloseCause, SessionState};
pub use socket::{CloseReason, SocketError, SocketWrapper};

// Internal modules
mod broadcast;
mod handler;
mod messages;
mod registry;
mod session;
mod socket;
