use bytes::Bytes;

/// Connection-state transitions and inbound frames reported by the
/// signaling/media collaborator for one member's connection. The room
/// consumes these from an explicit channel instead of transport-side
/// callbacks, so every mutation stays under the room lock discipline.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The transport reached its connected state for the first time.
    Connected,
    /// One frame arrived on the room data channel.
    Message(Bytes),
    /// The connection closed in an orderly way.
    Closed,
    /// The connection failed.
    Failed,
}
