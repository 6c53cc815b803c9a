use serde::{Deserialize, Serialize};

use crate::model::room::Visibility;
use crate::model::user::UserId;

/// Inbound protocol message on the room data channel. The sender is
/// resolved transport-side from the peer id, never trusted from the
/// payload.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Command {
    MuteUpdate { muted: bool },
    Reaction { emoji: String },
    LinkShare { link: String },
    InviteAdmin { id: UserId },
    AcceptAdmin,
    RemoveAdmin { id: UserId },
    RenameRoom { name: String },
    InviteUser { id: UserId },
    KickUser { id: UserId },
    MuteUser { id: UserId },
    RecordScreen,
    VisibilityUpdate { visibility: Visibility },
    PinLink { link: String },
    UnpinLink,
    /// Opens a mini by numeric id when `id != 0`, otherwise by slug.
    OpenMini { id: i64, slug: String },
    CloseMini,
    RequestMini { id: i64 },
}
