//! Room session core: the per-room state machine, its command/event
//! protocol, the concurrent room registry and the read-only surfaces
//! around them. Media transport and identity live in external
//! collaborators behind narrow traits.

pub mod config;
pub mod current_room;
pub mod http;
pub mod minis;
pub mod notifications;
pub mod query;
pub mod room;
pub mod transport;
