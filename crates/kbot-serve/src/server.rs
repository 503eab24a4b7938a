//! Server setup.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::health;
use crate::state::AppState;

/// Build the router over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/v1/challenges", get(api::list_challenges).post(api::create_challenge))
        .route("/v1/challenges/:name", delete(api::delete_challenge))
        .route("/v1/challenges/:name/submissions", post(api::submit))
        .route("/v1/challenges/:name/leaderboard", get(api::leaderboard))
        .route("/v1/challenges/:name/users/:user/submissions", get(api::user_submissions))
        .route("/v1/users/:user", delete(api::delete_user))
        .route("/v1/export", get(api::export))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server on the given address.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);

    tracing::info!("kernelbot server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
