use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use parlor_core::{RoomId, UserId};

#[derive(Debug, Error)]
pub enum CurrentRoomError {
    #[error("no current room for user")]
    NotFound,
    #[error("current room store unavailable: {0}")]
    Unavailable(String),
}

/// Persisted "current room per user" mapping. The core consumes this
/// collaborator; it does not own the storage behind it.
#[async_trait]
pub trait CurrentRoomStore: Send + Sync + 'static {
    async fn get_current_room(&self, user: UserId) -> Result<RoomId, CurrentRoomError>;

    async fn set_current_room(&self, user: UserId, room: &RoomId) -> Result<(), CurrentRoomError>;

    async fn remove_current_room(&self, user: UserId) -> Result<(), CurrentRoomError>;
}

/// In-memory store, good enough for a single process.
#[derive(Debug, Default)]
pub struct InMemoryCurrentRooms {
    rooms: DashMap<UserId, RoomId>,
}

impl InMemoryCurrentRooms {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CurrentRoomStore for InMemoryCurrentRooms {
    async fn get_current_room(&self, user: UserId) -> Result<RoomId, CurrentRoomError> {
        self.rooms
            .get(&user)
            .map(|r| r.clone())
            .ok_or(CurrentRoomError::NotFound)
    }

    async fn set_current_room(&self, user: UserId, room: &RoomId) -> Result<(), CurrentRoomError> {
        self.rooms.insert(user, room.clone());
        Ok(())
    }

    async fn remove_current_room(&self, user: UserId) -> Result<(), CurrentRoomError> {
        self.rooms.remove(&user);
        Ok(())
    }
}
