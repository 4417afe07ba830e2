//! `POST /v1/chat/stream` (SSE) and `POST /v1/chat/stop`.

use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::runtime::{TurnError, TurnInput, TurnOutcome};
use crate::state::AppState;
use crate::surface::{ChannelSurface, Identity, SurfaceEvent};

use super::session::SessionRequest;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Defaults to one session per authenticated user.
    #[serde(default)]
    pub session_key: Option<String>,
    pub message: String,
    /// Files to upload before the message is posted, relative to
    /// `attachments.upload_dir`.
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

/// Final SSE event of a turn.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnEnd {
    Completed {
        citations: usize,
        tool_calls: usize,
        files: Vec<PathBuf>,
    },
    Cancelled,
    Failed { error: String },
}

pub(crate) fn session_key_for(identity: &Identity, explicit: Option<&str>) -> String {
    match explicit.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => key.to_string(),
        None => format!("user:{}", identity.username),
    }
}

pub async fn chat_stream(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<ChatRequest>,
) -> Response {
    let session_key = session_key_for(&identity, body.session_key.as_deref());

    let attachments =
        match resolve_attachments(&state.config.attachments.upload_dir, &body.attachments).await {
            Ok(paths) => paths,
            Err(error) => {
                tracing::warn!(session_key = %session_key, %error, "attachment rejected");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": error })),
                )
                    .into_response();
            }
        };

    let permit = match state.session_locks.try_acquire(&session_key) {
        Ok(p) => p,
        Err(busy) => {
            return (
                StatusCode::CONFLICT,
                Json(serde_json::json!({ "error": busy.to_string() })),
            )
                .into_response()
        }
    };

    let session = state.sessions.get_or_create(&session_key);
    let cancel = state.cancel_map.register(&session_key);
    let (surface, rx) = ChannelSurface::channel(64);
    let (end_tx, end_rx) = oneshot::channel();
    let input = TurnInput {
        content: body.message,
        attachments,
    };

    let span = tracing::info_span!(
        "turn",
        session_key = %session_key,
        user = %identity.username,
        "otel.kind" = "SERVER",
    );
    let task_state = state.clone();
    tokio::spawn(
        async move {
            // The permit is held for the whole turn, even if the client
            // disconnects mid-stream.
            let _permit = permit;
            tracing::debug!("turn started");
            let result = task_state
                .orchestrator
                .run_turn(&session, &surface, input, &cancel)
                .await;
            task_state.cancel_map.remove(session.key());
            drop(surface);
            let _ = end_tx.send(turn_end(result));
        }
        .instrument(span),
    );

    Sse::new(make_sse_stream(rx, end_rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Resolve requested attachment names to files under `upload_dir`, after
/// `..` and symlinks are followed. Absolute paths and anything escaping the
/// directory are rejected.
pub(crate) async fn resolve_attachments(
    upload_dir: &Path,
    requested: &[PathBuf],
) -> Result<Vec<PathBuf>, String> {
    if requested.is_empty() {
        return Ok(Vec::new());
    }
    let root = tokio::fs::canonicalize(upload_dir)
        .await
        .map_err(|e| format!("attachments are not accepted ({}): {e}", upload_dir.display()))?;

    let mut resolved = Vec::with_capacity(requested.len());
    for name in requested {
        let path = tokio::fs::canonicalize(root.join(name))
            .await
            .map_err(|_| format!("attachment not found: {}", name.display()))?;
        if !path.starts_with(&root) {
            return Err(format!(
                "attachment outside the upload directory: {}",
                name.display()
            ));
        }
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(format!("attachment is not a file: {}", name.display()));
        }
        resolved.push(path);
    }
    Ok(resolved)
}

fn turn_end(result: Result<TurnOutcome, TurnError>) -> TurnEnd {
    match result {
        Ok(TurnOutcome::Completed(summary)) => TurnEnd::Completed {
            citations: summary.citations.len(),
            tool_calls: summary.tool_calls.len(),
            files: summary.files,
        },
        Ok(TurnOutcome::Cancelled { .. }) => TurnEnd::Cancelled,
        Err(e) => TurnEnd::Failed {
            error: e.to_string(),
        },
    }
}

fn make_sse_stream(
    mut rx: mpsc::Receiver<SurfaceEvent>,
    end_rx: oneshot::Receiver<TurnEnd>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().event(event.name()).data(data));
        }
        if let Ok(end) = end_rx.await {
            let data = serde_json::to_string(&end).unwrap_or_default();
            yield Ok(Event::default().event("turn_end").data(data));
        }
    }
}

/// `POST /v1/chat/stop`: cancel the in-flight turn of a session.
pub async fn stop(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<SessionRequest>,
) -> impl IntoResponse {
    let key = session_key_for(&identity, body.session_key.as_deref());
    let stopped = state.cancel_map.cancel(&key);
    tracing::info!(session_key = %key, stopped, "stop requested");
    Json(serde_json::json!({ "session_key": key, "stopped": stopped }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn who() -> Identity {
        Identity {
            username: "sales@contoso.com".into(),
            role: "sales".into(),
        }
    }

    #[test]
    fn session_key_defaults_to_user() {
        assert_eq!(session_key_for(&who(), None), "user:sales@contoso.com");
        assert_eq!(session_key_for(&who(), Some("  ")), "user:sales@contoso.com");
        assert_eq!(session_key_for(&who(), Some("web:42")), "web:42");
    }

    #[test]
    fn turn_end_serializes_status() {
        let v = serde_json::to_value(TurnEnd::Failed {
            error: "boom".into(),
        })
        .unwrap();
        assert_eq!(v["status"], "failed");
        assert_eq!(v["error"], "boom");
        let v = serde_json::to_value(TurnEnd::Cancelled).unwrap();
        assert_eq!(v["status"], "cancelled");
    }

    fn upload_fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(uploads.join("q3")).unwrap();
        std::fs::write(uploads.join("q3/report.csv"), "region,total\n").unwrap();
        std::fs::write(dir.path().join("config.toml"), "secret").unwrap();
        (dir, uploads)
    }

    #[tokio::test]
    async fn attachments_resolve_inside_upload_dir() {
        let (_dir, uploads) = upload_fixture();
        let paths = resolve_attachments(&uploads, &[PathBuf::from("q3/report.csv")])
            .await
            .unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("q3/report.csv"));
    }

    #[tokio::test]
    async fn attachments_cannot_escape_upload_dir() {
        let (dir, uploads) = upload_fixture();
        let err = resolve_attachments(&uploads, &[PathBuf::from("../config.toml")])
            .await
            .unwrap_err();
        assert!(err.contains("outside the upload directory"), "{err}");

        let absolute = dir.path().join("config.toml");
        let err = resolve_attachments(&uploads, &[absolute]).await.unwrap_err();
        assert!(err.contains("outside the upload directory"), "{err}");

        let err = resolve_attachments(&uploads, &[PathBuf::from("q3")])
            .await
            .unwrap_err();
        assert!(err.contains("not a file"), "{err}");
    }

    #[tokio::test]
    async fn no_attachments_needs_no_upload_dir() {
        let paths = resolve_attachments(Path::new("/nonexistent/uploads"), &[])
            .await
            .unwrap();
        assert!(paths.is_empty());
    }
}
