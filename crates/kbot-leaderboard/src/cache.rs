//! Memoized leaderboards, keyed by challenge name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::{rank, render, LeaderboardEntry, SubmissionRecord};

/// A ranked leaderboard together with its rendered text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Board {
    pub entries: Vec<LeaderboardEntry>,
    pub text: String,
}

impl Board {
    /// Rank `submissions` and render the result.
    pub fn build(challenge: &str, submissions: &[SubmissionRecord]) -> Self {
        let entries = rank(submissions);
        let text = render(challenge, &entries);
        Self { entries, text }
    }
}

#[derive(Debug, Default)]
struct Inner {
    boards: HashMap<String, Arc<Board>>,
    /// Bumped by every invalidation. A board built across a bump may come
    /// from a stale snapshot and is returned without being cached.
    generation: u64,
}

/// Ranked and rendered leaderboards. Entries stay valid until explicitly
/// invalidated; callers invalidate after every recorded submission or
/// deletion.
#[derive(Debug, Default)]
pub struct LeaderboardCache {
    inner: Mutex<Inner>,
}

impl LeaderboardCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached board for `challenge`, building it with `build` on a miss.
    ///
    /// `build` runs without the cache lock held, so it may take other locks
    /// (the challenge store) to snapshot submissions.
    pub fn get_or_build(&self, challenge: &str, build: impl FnOnce() -> Board) -> Arc<Board> {
        let generation = {
            let inner = self.inner.lock();
            if let Some(board) = inner.boards.get(challenge) {
                return Arc::clone(board);
            }
            inner.generation
        };

        tracing::debug!("leaderboard cache miss for {}", challenge);
        let board = Arc::new(build());

        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.boards.insert(challenge.to_string(), Arc::clone(&board));
        } else {
            tracing::debug!("leaderboard for {} changed while building, not caching", challenge);
        }
        board
    }

    pub fn invalidate(&self, challenge: &str) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.boards.remove(challenge);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.boards.clear();
    }

    pub fn contains(&self, challenge: &str) -> bool {
        self.inner.lock().boards.contains_key(challenge)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn board(text: &str) -> Board {
        Board { entries: Vec::new(), text: text.to_string() }
    }

    #[test]
    fn test_memoizes_until_invalidated() {
        let cache = LeaderboardCache::new();
        let builds = Cell::new(0);
        let build = || {
            builds.set(builds.get() + 1);
            board(&format!("board v{}", builds.get()))
        };
        assert_eq!(cache.get_or_build("matmul", build).text, "board v1");
        assert_eq!(cache.get_or_build("matmul", build).text, "board v1");
        assert_eq!(builds.get(), 1);

        cache.invalidate("matmul");
        assert!(!cache.contains("matmul"));
        assert_eq!(cache.get_or_build("matmul", build).text, "board v2");
    }

    #[test]
    fn test_keys_are_independent() {
        let cache = LeaderboardCache::new();
        cache.get_or_build("a", || board("A"));
        cache.get_or_build("b", || board("B"));
        cache.invalidate("a");
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("b"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidation_during_build_is_not_cached() {
        let cache = LeaderboardCache::new();
        // A submission lands after the snapshot was taken but before the
        // stale board would be stored.
        let stale = cache.get_or_build("matmul", || {
            let snapshot = board("before");
            cache.invalidate("matmul");
            snapshot
        });
        assert_eq!(stale.text, "before");
        assert!(!cache.contains("matmul"));

        let fresh = cache.get_or_build("matmul", || board("after"));
        assert_eq!(fresh.text, "after");
        assert!(cache.contains("matmul"));
    }

    #[test]
    fn test_clear_during_build_is_not_cached() {
        let cache = LeaderboardCache::new();
        cache.get_or_build("add", || {
            cache.clear();
            board("stale")
        });
        assert!(!cache.contains("add"));
    }

    #[test]
    fn test_board_build_ranks_and_renders() {
        let subs = vec![SubmissionRecord {
            id: 1,
            challenge: "add".into(),
            user: "ada".into(),
            kernel_name: "k".into(),
            kernel_type: "CUDA".into(),
            timing: 0.002,
            created_at: 0,
        }];
        let board = Board::build("add", &subs);
        assert_eq!(board.entries.len(), 1);
        assert!(board.text.starts_with("# Challenge: `add`"));
        assert!(board.text.contains("by ada"));
    }
}
