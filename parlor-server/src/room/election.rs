use parlor_core::UserId;

/// Tie-break for promoting a member to admin when a room becomes
/// leaderless. The protocol leaves the choice unspecified, so it is a
/// pluggable policy; tests pin a deterministic one.
pub trait ElectionPolicy: Send + Sync + 'static {
    fn pick(&self, candidates: &[UserId]) -> Option<UserId>;
}

/// Takes whichever candidate the membership map yields first. This is
/// the historical behavior: no ordering is promised.
#[derive(Debug, Default)]
pub struct FirstSeen;

impl ElectionPolicy for FirstSeen {
    fn pick(&self, candidates: &[UserId]) -> Option<UserId> {
        candidates.first().copied()
    }
}

/// Deterministic policy: the lowest user id wins.
#[derive(Debug, Default)]
pub struct LowestId;

impl ElectionPolicy for LowestId {
    fn pick(&self, candidates: &[UserId]) -> Option<UserId> {
        candidates.iter().min().copied()
    }
}
