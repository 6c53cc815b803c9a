use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::model::user::UserId;

#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
pub struct RoomId(pub String);

impl RoomId {
    /// Generate a fresh id for a newly created room.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Listener,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MiniSize {
    Small,
    Regular,
    Large,
}

/// Descriptor of an embedded mini-app, resolved through the mini lookup
/// collaborator when an admin opens one.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct MiniProfile {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub size: MiniSize,
}

/// Point-in-time snapshot of one member, as carried by `Joined` events
/// and room state queries.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct RoomMember {
    pub id: UserId,
    pub display_name: String,
    pub image: String,
    pub role: Role,
    pub muted: bool,
}

/// Read-only snapshot of a whole room.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoomState {
    pub id: RoomId,
    pub name: String,
    pub visibility: Visibility,
    pub members: Vec<RoomMember>,
    pub link: String,
    pub mini: Option<MiniProfile>,
}
