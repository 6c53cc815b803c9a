use serde::{Deserialize, Serialize};

use crate::model::room::{MiniProfile, RoomMember, Visibility};
use crate::model::user::UserId;

/// Outbound protocol message on the room data channel.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    /// The member whose action produced the event. Broadcasts never
    /// loop back to this member.
    pub from: UserId,
    pub payload: EventPayload,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum EventPayload {
    Joined { user: RoomMember },
    Left,
    MuteUpdated { is_muted: bool },
    Reacted { emoji: String },
    LinkShared { link: String },
    InvitedAdmin { id: UserId },
    AddedAdmin { id: UserId },
    RemovedAdmin { id: UserId },
    RenamedRoom { name: String },
    MutedByAdmin { id: UserId },
    RecordedScreen,
    VisibilityUpdated { visibility: Visibility },
    PinnedLink { link: String },
    UnpinnedLink,
    OpenedMini { mini: MiniProfile },
    ClosedMini,
    RequestedMini { mini: MiniProfile },
}
