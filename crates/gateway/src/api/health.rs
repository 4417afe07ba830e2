use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;
use crate::surface::starters as configured_starters;

/// `GET /v1/health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len(),
        "session_locks": state.session_locks.session_count(),
        "active_agents": state.orchestrator.active_sessions(),
        "auth": state.authenticator.enabled(),
    }))
}

/// `GET /v1/starters`
pub async fn starters(State(state): State<AppState>) -> impl IntoResponse {
    Json(configured_starters(&state.config))
}
