mod command;
mod event;
mod room;
mod user;

pub use command::Command;
pub use event::{Event, EventPayload};
pub use room::{MiniProfile, MiniSize, Role, RoomId, RoomMember, RoomState, Visibility};
pub use user::UserId;
