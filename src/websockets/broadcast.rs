use std::sync::Arc;
use tracing::{debug, instrument};

use super::{messages::ServerEvent, registry::RoomRegistry};
use crate::shared::AppError;

/// Fans one event out to every live session of a room.
///
/// Events are serialized once and handed to the registry, which owns per-recipient
/// delivery. A multi-node deployment would publish here instead of calling the
/// local registry directly.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<dyn RoomRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<dyn RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Returns how many sessions the event was queued for
    #[instrument(skip(self, event), fields(event_type = event.event_type()))]
    pub async fn broadcast(&self, room_id: &str, event: &ServerEvent) -> Result<usize, AppError> {
        let payload = event.to_json()?;
        let delivered = self.registry.broadcast(room_id, &payload).await;

        debug!(room_id = %room_id, delivered, "Event broadcast");
        Ok(delivered)
    }
}
