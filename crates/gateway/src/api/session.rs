use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use serde::Deserialize;

use crate::state::AppState;
use crate::surface::Identity;

use super::chat::session_key_for;

#[derive(Debug, Default, Deserialize)]
pub struct SessionRequest {
    #[serde(default)]
    pub session_key: Option<String>,
}

/// `POST /v1/session/reset`: delete the session's remote agent, thread and
/// uploads. The next message starts from scratch.
pub async fn reset(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<SessionRequest>,
) -> Response {
    let key = session_key_for(&identity, body.session_key.as_deref());
    let permit = match state.session_locks.try_acquire(&key) {
        Ok(p) => p,
        Err(busy) => {
            return (
                StatusCode::CONFLICT,
                Json(serde_json::json!({ "error": busy.to_string() })),
            )
                .into_response()
        }
    };

    let existed = match state.sessions.remove(&key) {
        Some(session) => {
            state.orchestrator.teardown(&session).await;
            true
        }
        None => false,
    };
    drop(permit);
    state.session_locks.prune_idle();
    tracing::info!(session_key = %key, existed, "session reset");
    Json(serde_json::json!({ "session_key": key, "reset": existed })).into_response()
}
