use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    models::{is_reserved_room_name, private_room_name, RoomModel},
    repository::{RoomCreation, RoomRepository},
};
use crate::{
    auth::repository::AccountRepository,
    shared::{is_word, AppError},
};

/// Room lookup, lazy creation and membership rules
pub struct RoomDirectory {
    repository: Arc<dyn RoomRepository + Send + Sync>,
    accounts: Arc<dyn AccountRepository + Send + Sync>,
}

impl RoomDirectory {
    pub fn new(
        repository: Arc<dyn RoomRepository + Send + Sync>,
        accounts: Arc<dyn AccountRepository + Send + Sync>,
    ) -> Self {
        Self {
            repository,
            accounts,
        }
    }

    /// Idempotent by name; the creator becomes a member when the room is first created
    #[instrument(skip(self))]
    pub async fn resolve_or_create_group_room(
        &self,
        name: &str,
        creator: &str,
    ) -> Result<RoomModel, AppError> {
        if !is_word(name) {
            return Err(AppError::BadRequest(
                "Room name must be word characters only".to_string(),
            ));
        }
        if is_reserved_room_name(name) {
            warn!(room_name = %name, "Group room name uses the private prefix");
            return Err(AppError::Conflict(
                "Room names starting with private_ are reserved".to_string(),
            ));
        }

        let creation = self
            .repository
            .get_or_create_room(
                &RoomModel::new_group(name.to_string()),
                &[creator.to_string()],
            )
            .await?;

        let created = creation.was_created();
        let room = creation.into_room();
        if room.is_private {
            warn!(room_name = %name, "Group room name collides with a private room");
            return Err(AppError::Conflict(
                "A private room already uses that name".to_string(),
            ));
        }

        info!(room_id = %room.id, room_name = %room.name, created, "Group room resolved");
        Ok(room)
    }

    /// Pure and symmetric in its arguments
    pub fn private_room_name(&self, user_a: &str, user_b: &str) -> String {
        private_room_name(user_a, user_b)
    }

    /// Looks up the pair's room by its deterministic name, creating it with both members at once
    #[instrument(skip(self))]
    pub async fn get_or_create_private_room(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<RoomModel, AppError> {
        if user_a == user_b {
            return Err(AppError::BadRequest(
                "Cannot start a private chat with yourself".to_string(),
            ));
        }
        for username in [user_a, user_b] {
            if self.accounts.get_user(username).await?.is_none() {
                return Err(AppError::NotFound(format!("User not found: {}", username)));
            }
        }

        let creation = self
            .repository
            .get_or_create_room(
                &RoomModel::new_private(user_a, user_b),
                &[user_a.to_string(), user_b.to_string()],
            )
            .await?;

        if let RoomCreation::Created(room) = &creation {
            info!(room_id = %room.id, room_name = %room.name, "Private room created");
        }

        // A group room holding the pair's name must never stand in for their private chat
        let room = creation.into_room();
        if !room.is_private {
            warn!(room_id = %room.id, room_name = %room.name, "Private room name held by a group room");
            return Err(AppError::Conflict(
                "Room name is taken by a group room".to_string(),
            ));
        }
        Ok(room)
    }

    /// Never defaults: an unknown name is `RoomNotFound`
    #[instrument(skip(self))]
    pub async fn resolve_room(&self, name: &str) -> Result<RoomModel, AppError> {
        match self.repository.get_room_by_name(name).await? {
            Some(room) => Ok(room),
            None => {
                debug!(room_name = %name, "Room not found");
                Err(AppError::RoomNotFound(name.to_string()))
            }
        }
    }

    /// Public rooms are open to any authenticated user; private rooms only to their members
    #[instrument(skip(self, room), fields(room_id = %room.id))]
    pub async fn ensure_access(&self, room: &RoomModel, username: &str) -> Result<(), AppError> {
        if room.is_private && !self.repository.is_member(&room.id, username).await? {
            warn!(username = %username, "Non-member denied access to private room");
            return Err(AppError::Forbidden(
                "Not a member of this private room".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn list_members(&self, room_id: &str) -> Result<Vec<String>, AppError> {
        self.repository.list_members(room_id).await
    }

    pub async fn list_public_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        self.repository.list_public_rooms().await
    }

    pub async fn list_private_rooms_for(&self, username: &str) -> Result<Vec<RoomModel>, AppError> {
        self.repository.list_private_rooms_for(username).await
    }

    /// Usernames other than `username`, for starting private chats
    pub async fn list_other_users(&self, username: &str) -> Result<Vec<String>, AppError> {
        Ok(self
            .accounts
            .list_users()
            .await?
            .into_iter()
            .map(|user| user.username)
            .filter(|name| name != username)
            .collect())
    }
}
