use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use parlor_core::{RoomId, RoomMember, UserId, Visibility};

use crate::query::RoomQuery;
use crate::room::RoomFact;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("room is private")]
    RoomPrivate,
    #[error("room is empty")]
    NoRoomMembers,
    #[error("empty response")]
    EmptyResponse,
    #[error("failed to sort")]
    FailedToSort,
    #[error("not a room join fact")]
    WrongFact,
    #[error("target lookup failed: {0}")]
    Targets(String),
}

/// Who should hear about a user's activity. Resolved by an external
/// social-graph collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub user: UserId,
}

#[async_trait]
pub trait TargetSource: Send + Sync + 'static {
    async fn followers_of(&self, user: UserId) -> Result<Vec<Target>, NotificationError>;
}

/// Placeholder source for deployments without a social graph wired in.
#[derive(Debug, Default)]
pub struct NoFollowers;

#[async_trait]
impl TargetSource for NoFollowers {
    async fn followers_of(&self, _user: UserId) -> Result<Vec<Target>, NotificationError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub key: String,
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushNotification {
    pub category: String,
    pub alert: Alert,
    /// Also serves as the collapse key on the push gateway.
    pub room: RoomId,
}

pub const CATEGORY_ROOM_JOINED: &str = "ROOM_JOINED";

/// Turns room-join facts into push-notification targets and payloads.
/// Reads room state only through the query service; never touches the
/// room core directly.
pub struct RoomJoinNotificationHandler {
    query: RoomQuery,
    targets: Arc<dyn TargetSource>,
}

impl RoomJoinNotificationHandler {
    pub fn new(query: RoomQuery, targets: Arc<dyn TargetSource>) -> Self {
        Self { query, targets }
    }

    /// Followers of the joining user are the notification audience.
    pub async fn targets(&self, fact: &RoomFact) -> Result<Vec<Target>, NotificationError> {
        let RoomFact::RoomJoined { creator, .. } = fact else {
            return Err(NotificationError::WrongFact);
        };

        self.targets.followers_of(*creator).await
    }

    pub async fn build(&self, fact: &RoomFact) -> Result<PushNotification, NotificationError> {
        let RoomFact::RoomJoined {
            room,
            creator,
            visibility,
        } = fact
        else {
            return Err(NotificationError::WrongFact);
        };

        if *visibility == Visibility::Private {
            return Err(NotificationError::RoomPrivate);
        }

        let response = self.query.get_room(room).await;
        if !response.error.is_empty() {
            return Err(NotificationError::EmptyResponse);
        }

        let state = response.state.ok_or(NotificationError::EmptyResponse)?;
        if state.members.is_empty() {
            return Err(NotificationError::NoRoomMembers);
        }

        // Translation keys are suffixed with the member count; the room
        // name, when present, switches the base key and leads the
        // arguments.
        let mut key = "join_room_with_".to_owned();
        let mut arguments: Vec<String> = Vec::new();

        if !state.name.is_empty() {
            key = "join_room_name_with_".to_owned();
            arguments.push(state.name.clone());
        }

        let count = state.members.len();
        match count {
            1..=3 => {
                key.push_str(&count.to_string());
                arguments.extend(state.members.iter().map(|m| m.display_name.clone()));
            }
            _ => {
                key.push_str("3_and_more");

                let names = creator_first_names(&state.members, *creator);
                if names.len() < 3 {
                    return Err(NotificationError::FailedToSort);
                }

                arguments.extend(names);
                arguments.push((count - 3).to_string());
            }
        }

        key.push_str("_notification");

        Ok(PushNotification {
            category: CATEGORY_ROOM_JOINED.to_owned(),
            alert: Alert { key, arguments },
            room: state.id,
        })
    }
}

/// Names for the crowded-room key: the creator leads, followed by the
/// first two other members. Fewer than three names means the creator
/// was not in the snapshot and the caller rejects the fact.
fn creator_first_names(members: &[RoomMember], creator: UserId) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = Vec::new();

    for member in members {
        if member.id == creator {
            names.push(member.display_name.clone());
        } else {
            rest.push(member);
        }
    }

    names.extend(rest.iter().take(2).map(|m| m.display_name.clone()));
    names
}
