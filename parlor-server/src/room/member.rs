use parlor_core::{Role, RoomMember, UserId};

use crate::transport::{Outbound, PeerSink};

/// Per-connection state for one participant in one room. Owned by the
/// room for the lifetime of the connection; all mutation happens under
/// the room lock.
#[derive(Debug)]
pub struct Member {
    id: UserId,
    display_name: String,
    image: String,
    role: Role,
    muted: bool,
    connected: bool,
    peer_id: String,
    sink: PeerSink,
}

impl Member {
    pub fn new(
        id: UserId,
        display_name: &str,
        image: &str,
        role: Role,
        peer_id: &str,
        sink: PeerSink,
    ) -> Self {
        Self {
            id,
            display_name: display_name.to_owned(),
            image: image.to_owned(),
            role,
            muted: true,
            connected: false,
            peer_id: peer_id.to_owned(),
            sink,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn mute(&mut self) {
        self.muted = true;
    }

    pub fn unmute(&mut self) {
        self.muted = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Set exactly once, on the first transition to connected.
    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    pub fn sink(&self) -> PeerSink {
        self.sink.clone()
    }

    /// Ask the transport to tear the connection down. Errors are
    /// irrelevant here: a closed channel means the transport is gone
    /// already.
    pub fn close(&self) {
        let _ = self.sink.send(Outbound::Close);
    }

    pub fn to_state(&self) -> RoomMember {
        RoomMember {
            id: self.id,
            display_name: self.display_name.clone(),
            image: self.image.clone(),
            role: self.role,
            muted: self.muted,
        }
    }
}
