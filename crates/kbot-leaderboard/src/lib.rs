//! # kbot-leaderboard
//!
//! Ranking of passing submissions per challenge.
//!
//! Provides:
//! - Per-user best timing with ordinal ranks and medal labels
//! - Personal-best classification of a new result
//! - Text rendering of leaderboards and per-user history
//! - A memoized leaderboard cache with explicit invalidation
//! - Best-per-user export rows

pub mod cache;
pub mod export;
pub mod rank;
pub mod render;

pub use cache::{Board, LeaderboardCache};
pub use export::{export_best, ExportRow};
pub use rank::{classify, rank, LeaderboardEntry, RankLabel, Standing, SubmissionRecord};
pub use render::{history, render, render_history, History, HistoryEntry};
