mod connection_event;
mod peer_sink;

pub use connection_event::*;
pub use peer_sink::*;
