mod auth;
mod election;
mod hooks;
mod member;
mod repository;
mod room;

pub use auth::*;
pub use election::*;
pub use hooks::*;
pub use member::*;
pub use repository::*;
pub use room::*;
