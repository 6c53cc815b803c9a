use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use parlor_core::{RoomId, RoomMember, UserId, Visibility};

use crate::current_room::CurrentRoomStore;
use crate::room::Room;

/// Callbacks the room invokes at its boundary. Implementations must not
/// reach back into the room synchronously while holding its lock; the
/// room always calls them with the lock released.
#[async_trait]
pub trait RoomHooks: Send + Sync + 'static {
    /// A member's transport reached connected state. `is_new` marks the
    /// first member of a fresh room.
    async fn on_join(&self, room: &Room, member: &RoomMember, is_new: bool);

    /// A member invited another user into the room.
    async fn on_invite(&self, room: &RoomId, from: UserId, to: UserId);

    /// A member's connection ended and it was removed from the room.
    async fn on_disconnected(&self, room: &RoomId, member: &RoomMember);
}

/// Facts selected room events publish to the external event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomFact {
    RoomJoined {
        room: RoomId,
        creator: UserId,
        visibility: Visibility,
    },
    LinkShared {
        user: UserId,
        room: RoomId,
    },
    MiniOpened {
        user: UserId,
        mini: i64,
        room: RoomId,
    },
}

/// Fire-and-forget publisher towards the event bus collaborator.
pub trait FactBus: Send + Sync + 'static {
    fn publish(&self, fact: RoomFact);
}

/// Bus backed by an in-process channel. The receiving half is handed to
/// whatever consumes the facts (notification relevance, analytics).
pub struct ChannelBus {
    tx: mpsc::UnboundedSender<RoomFact>,
}

impl ChannelBus {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<RoomFact>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl FactBus for ChannelBus {
    fn publish(&self, fact: RoomFact) {
        if self.tx.send(fact).is_err() {
            warn!("fact bus receiver dropped");
        }
    }
}

/// Production hooks: keep the persisted current-room mapping in step
/// with membership and surface join facts on the bus.
pub struct ServiceHooks {
    current_rooms: Arc<dyn CurrentRoomStore>,
    bus: Arc<dyn FactBus>,
}

impl ServiceHooks {
    pub fn new(current_rooms: Arc<dyn CurrentRoomStore>, bus: Arc<dyn FactBus>) -> Self {
        Self { current_rooms, bus }
    }
}

#[async_trait]
impl RoomHooks for ServiceHooks {
    async fn on_join(&self, room: &Room, member: &RoomMember, is_new: bool) {
        if let Err(e) = self
            .current_rooms
            .set_current_room(member.id, room.id())
            .await
        {
            warn!("failed to store current room for {}: {}", member.id, e);
        }

        if is_new {
            self.bus.publish(RoomFact::RoomJoined {
                room: room.id().clone(),
                creator: member.id,
                visibility: room.visibility().await,
            });
        }
    }

    async fn on_invite(&self, room: &RoomId, from: UserId, to: UserId) {
        info!("user {} invited {} to room {}", from, to, room);
    }

    async fn on_disconnected(&self, room: &RoomId, member: &RoomMember) {
        if let Err(e) = self.current_rooms.remove_current_room(member.id).await {
            warn!("failed to clear current room for {} in {}: {}", member.id, room, e);
        }
    }
}
