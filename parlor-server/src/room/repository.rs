use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use parlor_core::RoomId;

use crate::room::Room;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room not found")]
    NotFound,
}

/// Concurrent registry of live rooms; the single source of truth for
/// whether a room id exists.
#[derive(Default)]
pub struct Repository {
    rooms: RwLock<HashMap<RoomId, Arc<Room>>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a room under its id.
    pub async fn set(&self, room: Arc<Room>) {
        let mut rooms = self.rooms.write().await;
        rooms.insert(room.id().clone(), room);
    }

    pub async fn get(&self, id: &RoomId) -> Result<Arc<Room>, RoomError> {
        let rooms = self.rooms.read().await;
        rooms.get(id).cloned().ok_or(RoomError::NotFound)
    }

    pub async fn remove(&self, id: &RoomId) {
        let mut rooms = self.rooms.write().await;
        rooms.remove(id);
    }

    /// Visit a point-in-time snapshot of all rooms. The handles are
    /// copied under the read lock and visited after it is released, so
    /// the visitor may itself take room locks.
    pub async fn map<F>(&self, mut visit: F)
    where
        F: FnMut(&Arc<Room>),
    {
        let snapshot: Vec<Arc<Room>> = {
            let rooms = self.rooms.read().await;
            rooms.values().cloned().collect()
        };

        for room in &snapshot {
            visit(room);
        }
    }
}
