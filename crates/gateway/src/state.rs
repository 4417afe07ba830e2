use std::collections::HashMap;
use std::sync::Arc;

use ar_domain::config::Config;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::runtime::{CancelMap, Orchestrator, SessionLockMap, SessionStore};
use crate::surface::{Authenticator, Identity};

/// Shared application state passed to all API handlers and CLI commands.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,

    // ── Sessions ──────────────────────────────────────────────────────
    pub sessions: Arc<SessionStore>,
    pub session_locks: Arc<SessionLockMap>,
    pub cancel_map: Arc<CancelMap>,

    // ── Auth ──────────────────────────────────────────────────────────
    pub authenticator: Arc<Authenticator>,
    /// SHA-256 digests of bearer tokens handed out by `/v1/auth/login`.
    pub issued_tokens: Arc<RwLock<HashMap<[u8; 32], Identity>>>,
}

impl AppState {
    /// Mint a bearer token for `identity`; only its digest is kept.
    pub fn issue_token(&self, identity: Identity) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let digest: [u8; 32] = Sha256::digest(token.as_bytes()).into();
        self.issued_tokens.write().insert(digest, identity);
        token
    }

    pub fn identity_for_token(&self, token: &str) -> Option<Identity> {
        let digest: [u8; 32] = Sha256::digest(token.as_bytes()).into();
        self.issued_tokens.read().get(&digest).cloned()
    }

    /// Tear down every live session (process shutdown).
    pub async fn shutdown_sessions(&self) {
        self.cancel_map.cancel_all();
        for session in self.sessions.drain() {
            let _permit = self.session_locks.acquire(session.key()).await;
            self.orchestrator.teardown(&session).await;
        }
    }
}
