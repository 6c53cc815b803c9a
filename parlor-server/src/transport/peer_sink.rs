use bytes::Bytes;
use tokio::sync::mpsc;

/// Frame handed to a member's outbound transport task.
#[derive(Debug)]
pub enum Outbound {
    /// Serialized event to deliver on the room data channel.
    Frame(Bytes),
    /// Instruct the transport to close the connection.
    Close,
}

/// Outbound notify capability of one member. Sending never blocks;
/// a send error means the transport task is gone and the member is
/// effectively disconnected.
pub type PeerSink = mpsc::UnboundedSender<Outbound>;

pub fn peer_channel() -> (PeerSink, mpsc::UnboundedReceiver<Outbound>) {
    mpsc::unbounded_channel()
}
