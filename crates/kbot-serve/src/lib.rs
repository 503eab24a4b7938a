//! # kbot-serve
//!
//! HTTP front-end for the kernel benchmark harness.
//!
//! Provides:
//! - `/v1/challenges`: create, list and delete challenges
//! - `/v1/challenges/:name/submissions`: evaluate a submission
//! - `/v1/challenges/:name/leaderboard`: memoized leaderboard
//! - `/v1/challenges/:name/users/:user/submissions`: a user's history
//! - `/v1/users/:user`: delete a user
//! - `/v1/export`: best submissions per challenge and user
//! - `/health`: health check
//!
//! Challenges and submissions live in an in-memory [`store::ChallengeStore`].

pub mod api;
pub mod error;
pub mod health;
pub mod server;
pub mod state;
pub mod store;

pub use error::ApiError;
pub use state::AppState;
