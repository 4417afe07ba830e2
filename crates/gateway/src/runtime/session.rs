//! Explicit per-session context.
//!
//! A session owns the remote agent and thread created on its first turn and
//! every attachment uploaded since. The state sits behind a
//! `tokio::sync::Mutex` so exactly one turn mutates it at a time.

use std::collections::HashMap;
use std::sync::Arc;

use ar_domain::attachment::{MessageAttachment, UploadedAttachment};
use ar_remote::{AgentHandle, ThreadHandle};
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct SessionState {
    pub agent: Option<AgentHandle>,
    pub thread: Option<ThreadHandle>,
    pub uploads: Vec<UploadedAttachment>,
    /// Set when initialization failed; the session refuses further turns.
    pub poisoned: Option<String>,
}

impl SessionState {
    pub fn is_initialized(&self) -> bool {
        self.agent.is_some() && self.thread.is_some()
    }

    /// References for every attachment uploaded in this session.
    pub fn message_attachments(&self) -> Vec<MessageAttachment> {
        self.uploads
            .iter()
            .map(UploadedAttachment::as_message_attachment)
            .collect()
    }

    /// Forget remote resources so the next turn recreates them.
    pub fn reset(&mut self) {
        self.agent = None;
        self.thread = None;
        self.uploads.clear();
    }
}

pub struct Session {
    key: String,
    pub(crate) state: tokio::sync::Mutex<SessionState>,
}

impl Session {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: tokio::sync::Mutex::new(SessionState::default()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn is_poisoned(&self) -> bool {
        self.state.lock().await.poisoned.is_some()
    }

    pub async fn uploads(&self) -> Vec<UploadedAttachment> {
        self.state.lock().await.uploads.clone()
    }

    pub async fn agent(&self) -> Option<AgentHandle> {
        self.state.lock().await.agent.clone()
    }

    pub async fn thread(&self) -> Option<ThreadHandle> {
        self.state.lock().await.thread.clone()
    }
}

/// All live sessions by key.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, key: &str) -> Arc<Session> {
        self.sessions
            .lock()
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Session::new(key)))
            .clone()
    }

    pub fn remove(&self, key: &str) -> Option<Arc<Session>> {
        self.sessions.lock().remove(key)
    }

    pub fn drain(&self) -> Vec<Arc<Session>> {
        self.sessions.lock().drain().map(|(_, s)| s).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
