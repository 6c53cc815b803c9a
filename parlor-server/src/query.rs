use serde::{Deserialize, Serialize};
use std::sync::Arc;

use parlor_core::{RoomId, RoomState};

use crate::room::Repository;

/// Response of the cross-service room query. Not-found travels as a
/// populated error string, not a transport failure; callers must check
/// the field.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoomResponse {
    pub state: Option<RoomState>,
    pub error: String,
}

/// Query-only read service over the repository. Never mutates room
/// state and holds each room's lock only long enough for one snapshot.
#[derive(Clone)]
pub struct RoomQuery {
    repository: Arc<Repository>,
}

impl RoomQuery {
    pub fn new(repository: Arc<Repository>) -> Self {
        Self { repository }
    }

    pub async fn get_room(&self, id: &RoomId) -> RoomResponse {
        match self.repository.get(id).await {
            Ok(room) => RoomResponse {
                state: Some(room.snapshot().await),
                error: String::new(),
            },
            Err(_) => RoomResponse {
                state: None,
                error: "not found".to_owned(),
            },
        }
    }
}
