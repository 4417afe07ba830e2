//! Login and bearer-token middleware.
//!
//! `POST /v1/auth/login` checks the configured user's password and hands out
//! a random bearer token; only the token's SHA-256 digest is kept in
//! `AppState`. Protected routes require `Authorization: Bearer <token>`.
//! With `auth.enabled = false` every request is admitted as the configured
//! user.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Response {
    match state.authenticator.authenticate(&body.username, &body.password) {
        Some(identity) => {
            let token = state.issue_token(identity.clone());
            tracing::info!(username = %identity.username, "login succeeded");
            Json(serde_json::json!({ "token": token, "identity": identity })).into_response()
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid username or password" })),
        )
            .into_response(),
    }
}

/// Axum middleware for protected routes. Attach via
/// `axum::middleware::from_fn_with_state`. The resolved
/// [`Identity`](crate::surface::Identity) is stored as a request extension.
pub async fn require_token(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(identity) = state.authenticator.anonymous() {
        req.extensions_mut().insert(identity);
        return next.run(req).await;
    }

    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    match state.identity_for_token(provided) {
        Some(identity) if !provided.is_empty() => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid or missing bearer token" })),
        )
            .into_response(),
    }
}
