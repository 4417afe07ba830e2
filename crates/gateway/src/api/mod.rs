pub mod auth;
pub mod chat;
pub mod health;
pub mod session;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (behind the bearer-token middleware).
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/v1/health", get(health::health))
        .route("/v1/starters", get(health::starters))
        .route("/v1/auth/login", post(auth::login));

    let protected = Router::new()
        .route("/v1/chat/stream", post(chat::chat_stream))
        .route("/v1/chat/stop", post(chat::stop))
        .route("/v1/session/reset", post(session::reset))
        .route_layer(middleware::from_fn_with_state(state, auth::require_token));

    public.merge(protected)
}
