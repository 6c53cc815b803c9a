mod endpoint;
mod ws_handler;

pub use endpoint::*;
pub use ws_handler::*;

use std::sync::Arc;

use crate::minis::MiniLookup;
use crate::room::{Auth, ElectionPolicy, FactBus, Repository, RoomHooks};

/// Shared state handed to every handler through the axum state
/// extractor.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<Repository>,
    pub auth: Arc<Auth>,
    pub minis: Arc<dyn MiniLookup>,
    pub hooks: Arc<dyn RoomHooks>,
    pub bus: Arc<dyn FactBus>,
    pub election: Arc<dyn ElectionPolicy>,
}
