use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use parlor_core::MiniProfile;

#[derive(Debug, Error)]
pub enum MiniLookupError {
    #[error("no mini found")]
    NotFound,
    #[error("mini backend unavailable: {0}")]
    Unavailable(String),
}

/// Lookup collaborator resolving mini-app descriptors. Failures drop
/// the triggering command; the room never caches results.
#[async_trait]
pub trait MiniLookup: Send + Sync + 'static {
    async fn get_with_id(&self, id: i64) -> Result<MiniProfile, MiniLookupError>;

    async fn get_with_slug(&self, slug: &str) -> Result<MiniProfile, MiniLookupError>;
}

/// Fixed in-process directory of minis, used for wiring and tests until
/// a real backend sits behind the trait.
#[derive(Debug, Default)]
pub struct StaticMinis {
    by_id: HashMap<i64, MiniProfile>,
}

impl StaticMinis {
    pub fn new(minis: Vec<MiniProfile>) -> Self {
        Self {
            by_id: minis.into_iter().map(|m| (m.id, m)).collect(),
        }
    }
}

#[async_trait]
impl MiniLookup for StaticMinis {
    async fn get_with_id(&self, id: i64) -> Result<MiniProfile, MiniLookupError> {
        self.by_id.get(&id).cloned().ok_or(MiniLookupError::NotFound)
    }

    async fn get_with_slug(&self, slug: &str) -> Result<MiniProfile, MiniLookupError> {
        self.by_id
            .values()
            .find(|m| m.slug == slug)
            .cloned()
            .ok_or(MiniLookupError::NotFound)
    }
}
