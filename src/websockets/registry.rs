use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Identity of one physical connection
pub type ConnectionId = Uuid;

/// Sending half of a session's outbound queue (registry -> socket task)
pub type OutboundSender = mpsc::UnboundedSender<String>;

/// Process-wide record of which sessions are live in which room
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Returns false once the registry has been shut down
    async fn register(
        &self,
        room_id: &str,
        connection_id: ConnectionId,
        username: &str,
        sender: OutboundSender,
    ) -> bool;

    /// No-op when the connection is not registered; returns whether anything was removed
    async fn deregister(&self, room_id: &str, connection_id: ConnectionId) -> bool;

    /// Delivers `payload` to every connection registered for the room at call time.
    /// Connections whose queue is closed are deregistered. Returns the delivered count.
    async fn broadcast(&self, room_id: &str, payload: &str) -> usize;

    async fn send_to(&self, room_id: &str, connection_id: ConnectionId, payload: &str) -> bool;

    /// Distinct usernames present in the room, sorted
    async fn online_users(&self, room_id: &str) -> Vec<String>;

    async fn connection_count(&self) -> usize;

    /// Drops every registered sender so each session sees its queue close and tears down.
    /// Returns the number of connections drained.
    async fn shutdown(&self) -> usize;
}

struct RegisteredConnection {
    username: String,
    sender: OutboundSender,
}

/// Single-process registry: one lock over room id -> connections
pub struct InMemoryRoomRegistry {
    rooms: RwLock<HashMap<String, HashMap<ConnectionId, RegisteredConnection>>>,
    closed: AtomicBool,
}

impl Default for InMemoryRoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    async fn remove_connections(&self, room_id: &str, connection_ids: &[ConnectionId]) {
        let mut rooms = self.rooms.write().await;
        if let Some(connections) = rooms.get_mut(room_id) {
            for connection_id in connection_ids {
                connections.remove(connection_id);
            }
            if connections.is_empty() {
                rooms.remove(room_id);
            }
        }
    }
}

#[async_trait]
impl RoomRegistry for InMemoryRoomRegistry {
    #[instrument(skip(self, sender))]
    async fn register(
        &self,
        room_id: &str,
        connection_id: ConnectionId,
        username: &str,
        sender: OutboundSender,
    ) -> bool {
        let mut rooms = self.rooms.write().await;
        // Checked under the write lock so nothing registers after shutdown drained the map
        if self.closed.load(Ordering::SeqCst) {
            debug!("Registry is shut down, refusing registration");
            return false;
        }

        rooms.entry(room_id.to_string()).or_default().insert(
            connection_id,
            RegisteredConnection {
                username: username.to_string(),
                sender,
            },
        );
        debug!(room_size = rooms[room_id].len(), "Connection registered");
        true
    }

    #[instrument(skip(self))]
    async fn deregister(&self, room_id: &str, connection_id: ConnectionId) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(connections) = rooms.get_mut(room_id) else {
            return false;
        };

        let removed = connections.remove(&connection_id).is_some();
        if connections.is_empty() {
            rooms.remove(room_id);
        }
        if removed {
            debug!("Connection deregistered");
        }
        removed
    }

    #[instrument(skip(self, payload))]
    async fn broadcast(&self, room_id: &str, payload: &str) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        {
            let rooms = self.rooms.read().await;
            let Some(connections) = rooms.get(room_id) else {
                debug!("Broadcast to room with no live connections");
                return 0;
            };

            for (connection_id, connection) in connections {
                if connection.sender.send(payload.to_string()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*connection_id);
                }
            }
        }

        if !dead.is_empty() {
            info!(
                dead_connections = dead.len(),
                "Pruning connections that could not be reached"
            );
            self.remove_connections(room_id, &dead).await;
        }

        delivered
    }

    #[instrument(skip(self, payload))]
    async fn send_to(&self, room_id: &str, connection_id: ConnectionId, payload: &str) -> bool {
        let delivered = {
            let rooms = self.rooms.read().await;
            match rooms.get(room_id).and_then(|c| c.get(&connection_id)) {
                Some(connection) => connection.sender.send(payload.to_string()).is_ok(),
                None => return false,
            }
        };

        if !delivered {
            self.remove_connections(room_id, &[connection_id]).await;
        }
        delivered
    }

    async fn online_users(&self, room_id: &str) -> Vec<String> {
        let rooms = self.rooms.read().await;
        let mut usernames: Vec<String> = rooms
            .get(room_id)
            .map(|connections| {
                connections
                    .values()
                    .map(|connection| connection.username.clone())
                    .collect()
            })
            .unwrap_or_default();
        usernames.sort();
        usernames.dedup();
        usernames
    }

    async fn connection_count(&self) -> usize {
        self.rooms.read().await.values().map(HashMap::len).sum()
    }

    #[instrument(skip(self))]
    async fn shutdown(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        self.closed.store(true, Ordering::SeqCst);

        let drained: usize = rooms.values().map(HashMap::len).sum();
        rooms.clear();

        info!(drained_connections = drained, "Room registry shut down");
        drained
    }
}
