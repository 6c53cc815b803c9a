use std::sync::Arc;

use parlor_core::{RoomId, UserId, Visibility};

use crate::room::Repository;

/// Decides whether a user may view or join a room. Public rooms admit
/// anyone; private rooms require an invite. A kick is a permanent veto,
/// independent of visibility or later invites.
pub struct Auth {
    repository: Arc<Repository>,
}

impl Auth {
    pub fn new(repository: Arc<Repository>) -> Self {
        Self { repository }
    }

    pub async fn can_join(&self, room: &RoomId, user: UserId) -> bool {
        let Ok(room) = self.repository.get(room).await else {
            return false;
        };

        if room.is_kicked(user).await {
            return false;
        }

        if room.visibility().await == Visibility::Public {
            return true;
        }

        room.is_invited(user).await
    }
}
