//! Shared application state.

use std::sync::Arc;

use kbot_harness::Backend;
use kbot_leaderboard::LeaderboardCache;
use parking_lot::Mutex;

use crate::store::ChallengeStore;

/// Shared state for the service. The store lock is never held across a
/// device job.
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub store: Arc<Mutex<ChallengeStore>>,
    pub leaderboards: Arc<LeaderboardCache>,
}

impl AppState {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            store: Arc::new(Mutex::new(ChallengeStore::new())),
            leaderboards: Arc::new(LeaderboardCache::new()),
        }
    }
}
