use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::models::RoomModel;
use crate::shared::AppError;

/// Result of an atomic get-or-create
#[derive(Debug, Clone)]
pub enum RoomCreation {
    /// The room was inserted together with its initial members
    Created(RoomModel),
    /// A room with that name already existed; members were left untouched
    Existing(RoomModel),
}

impl RoomCreation {
    pub fn into_room(self) -> RoomModel {
        match self {
            RoomCreation::Created(room) | RoomCreation::Existing(room) => room,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, RoomCreation::Created(_))
    }
}

/// Trait for room repository operations
#[async_trait]
pub trait RoomRepository {
    async fn get_room_by_name(&self, name: &str) -> Result<Option<RoomModel>, AppError>;

    /// Atomically inserts `room` with `members`, or returns the room already holding that name.
    /// A created room is never observable without its full initial membership.
    async fn get_or_create_room(
        &self,
        room: &RoomModel,
        members: &[String],
    ) -> Result<RoomCreation, AppError>;

    async fn is_member(&self, room_id: &str, username: &str) -> Result<bool, AppError>;
    /// Members ordered by username
    async fn list_members(&self, room_id: &str) -> Result<Vec<String>, AppError>;

    /// Public rooms ordered by name
    async fn list_public_rooms(&self) -> Result<Vec<RoomModel>, AppError>;
    /// Private rooms the user belongs to, ordered by name
    async fn list_private_rooms_for(&self, username: &str) -> Result<Vec<RoomModel>, AppError>;
}

#[derive(Default)]
struct RoomTables {
    rooms: HashMap<String, RoomModel>, // name -> room
    members: HashMap<String, BTreeSet<String>>, // room id -> usernames
}

/// In-memory implementation of RoomRepository for development and testing
#[derive(Default)]
pub struct InMemoryRoomRepository {
    tables: Mutex<RoomTables>,
}

impl InMemoryRoomRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self))]
    async fn get_room_by_name(&self, name: &str) -> Result<Option<RoomModel>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.rooms.get(name).cloned())
    }

    #[instrument(skip(self, room), fields(room_name = %room.name))]
    async fn get_or_create_room(
        &self,
        room: &RoomModel,
        members: &[String],
    ) -> Result<RoomCreation, AppError> {
        let mut tables = self.tables.lock().await;

        if let Some(existing) = tables.rooms.get(&room.name) {
            debug!(room_id = %existing.id, "Room already exists in memory");
            return Ok(RoomCreation::Existing(existing.clone()));
        }

        tables.rooms.insert(room.name.clone(), room.clone());
        tables
            .members
            .insert(room.id.clone(), members.iter().cloned().collect());

        info!(
            room_id = %room.id,
            is_private = room.is_private,
            member_count = members.len(),
            "Room created in memory"
        );
        Ok(RoomCreation::Created(room.clone()))
    }

    #[instrument(skip(self))]
    async fn is_member(&self, room_id: &str, username: &str) -> Result<bool, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .get(room_id)
            .map(|members| members.contains(username))
            .unwrap_or(false))
    }

    #[instrument(skip(self))]
    async fn list_members(&self, room_id: &str) -> Result<Vec<String>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn list_public_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        let tables = self.tables.lock().await;
        let mut rooms: Vec<RoomModel> = tables
            .rooms
            .values()
            .filter(|room| !room.is_private)
            .cloned()
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rooms)
    }

    #[instrument(skip(self))]
    async fn list_private_rooms_for(&self, username: &str) -> Result<Vec<RoomModel>, AppError> {
        let tables = self.tables.lock().await;
        let mut rooms: Vec<RoomModel> = tables
            .rooms
            .values()
            .filter(|room| {
                room.is_private
                    && tables
                        .members
                        .get(&room.id)
                        .is_some_and(|members| members.contains(username))
            })
            .cloned()
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rooms)
    }
}

/// PostgreSQL implementation of room repository
pub struct PostgresRoomRepository {
    pool: PgPool,
}

impl PostgresRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn room_from_row(row: &sqlx::postgres::PgRow) -> RoomModel {
    RoomModel {
        id: row.get("id"),
        name: row.get("name"),
        is_private: row.get("is_private"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl RoomRepository for PostgresRoomRepository {
    #[instrument(skip(self))]
    async fn get_room_by_name(&self, name: &str) -> Result<Option<RoomModel>, AppError> {
        let row = sqlx::query("SELECT id, name, is_private, created_at FROM rooms WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(room_from_row))
    }

    #[instrument(skip(self, room), fields(room_name = %room.name))]
    async fn get_or_create_room(
        &self,
        room: &RoomModel,
        members: &[String],
    ) -> Result<RoomCreation, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO rooms (id, name, is_private, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(&room.id)
        .bind(&room.name)
        .bind(room.is_private)
        .bind(room.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to insert room");
            AppError::DatabaseError(e.to_string())
        })?
        .rows_affected()
            == 1;

        if !inserted {
            let row =
                sqlx::query("SELECT id, name, is_private, created_at FROM rooms WHERE name = $1")
                    .bind(&room.name)
                    .fetch_one(&mut *tx)
                    .await?;
            tx.commit().await?;

            debug!("Room already exists in database");
            return Ok(RoomCreation::Existing(room_from_row(&row)));
        }

        for username in members {
            sqlx::query(
                "INSERT INTO room_members (room_id, username) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(&room.id)
            .bind(username)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(
            room_id = %room.id,
            is_private = room.is_private,
            member_count = members.len(),
            "Room created in database"
        );
        Ok(RoomCreation::Created(room.clone()))
    }

    #[instrument(skip(self))]
    async fn is_member(&self, room_id: &str, username: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT 1 FROM room_members WHERE room_id = $1 AND username = $2")
            .bind(room_id)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    #[instrument(skip(self))]
    async fn list_members(&self, room_id: &str) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT username FROM room_members WHERE room_id = $1 ORDER BY username",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("username")).collect())
    }

    #[instrument(skip(self))]
    async fn list_public_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, is_private, created_at FROM rooms WHERE NOT is_private ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(room_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn list_private_rooms_for(&self, username: &str) -> Result<Vec<RoomModel>, AppError> {
        let rows = sqlx::query(
            "SELECT r.id, r.name, r.is_private, r.created_at FROM rooms r \
             JOIN room_members m ON m.room_id = r.id \
             WHERE r.is_private AND m.username = $1 ORDER BY r.name",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(room_from_row).collect())
    }
}
