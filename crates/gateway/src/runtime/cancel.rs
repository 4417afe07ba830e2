//! Per-session cancellation tokens.
//!
//! Each running turn gets a `CancelToken`. `cancel()` makes the engine stop
//! forwarding events at its next await point and return a cancelled outcome.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Awaitable cancellation for one turn; clones share the same state.
pub type CancelToken = CancellationToken;

/// Active cancellation tokens by session key.
#[derive(Default)]
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a fresh token, replacing any previous one.
    pub fn register(&self, session_key: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens
            .lock()
            .insert(session_key.to_owned(), token.clone());
        token
    }

    /// Cancel the running turn of a session. Returns true if one was found.
    pub fn cancel(&self, session_key: &str) -> bool {
        match self.tokens.lock().get(session_key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, session_key: &str) {
        self.tokens.lock().remove(session_key);
    }

    /// Cancel everything (process shutdown).
    pub fn cancel_all(&self) {
        for token in self.tokens.lock().values() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_map_register_and_cancel() {
        let map = CancelMap::new();
        let token = map.register("s1");
        assert!(!token.is_cancelled());

        assert!(map.cancel("s1"));
        assert!(token.is_cancelled());

        map.remove("s1");
        assert!(!map.cancel("s1"));
    }

    #[test]
    fn register_replaces_previous_token() {
        let map = CancelMap::new();
        let old_token = map.register("s1");
        let new_token = map.register("s1");
        map.cancel("s1");
        assert!(new_token.is_cancelled());
        assert!(!old_token.is_cancelled());
    }

    #[test]
    fn cancel_all_reaches_every_session() {
        let map = CancelMap::new();
        let a = map.register("a");
        let b = map.register("b");
        map.cancel_all();
        assert!(a.is_cancelled() && b.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_through_map_wakes_the_running_turn() {
        let map = CancelMap::new();
        let waiter = map.register("s1");
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(map.cancel("s1"));
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter woke")
            .unwrap();
    }
}
