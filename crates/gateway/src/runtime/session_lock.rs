//! Per-session turn serialization.
//!
//! Each session key maps to a `Semaphore(1)`; the permit is held for the
//! whole turn and released on drop.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Default)]
pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn semaphore(&self, session_key: &str) -> Arc<Semaphore> {
        self.locks
            .lock()
            .entry(session_key.to_owned())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    /// Wait until the session is free.
    pub async fn acquire(&self, session_key: &str) -> Result<OwnedSemaphorePermit, SessionBusy> {
        self.semaphore(session_key)
            .acquire_owned()
            .await
            .map_err(|_| SessionBusy)
    }

    /// Take the session only if no turn is in flight.
    pub fn try_acquire(&self, session_key: &str) -> Result<OwnedSemaphorePermit, SessionBusy> {
        self.semaphore(session_key)
            .try_acquire_owned()
            .map_err(|_| SessionBusy)
    }

    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop locks nobody holds.
    pub fn prune_idle(&self) {
        self.locks
            .lock()
            .retain(|_, sem| sem.available_permits() == 0);
    }
}

#[derive(Debug, thiserror::Error)]
#[error("session is busy, a turn is already in progress")]
pub struct SessionBusy;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_access() {
        let map = SessionLockMap::new();
        drop(map.acquire("s1").await.unwrap());
        drop(map.acquire("s1").await.unwrap());
    }

    #[tokio::test]
    async fn different_sessions_concurrent() {
        let map = SessionLockMap::new();
        let _p1 = map.acquire("s1").await.unwrap();
        let _p2 = map.acquire("s2").await.unwrap();
        assert_eq!(map.session_count(), 2);
    }

    #[tokio::test]
    async fn try_acquire_reports_busy() {
        let map = SessionLockMap::new();
        let p1 = map.try_acquire("s1").unwrap();
        assert!(map.try_acquire("s1").is_err());
        drop(p1);
        assert!(map.try_acquire("s1").is_ok());
    }

    #[tokio::test]
    async fn same_session_waits() {
        let map = Arc::new(SessionLockMap::new());
        let map2 = map.clone();
        let p1 = map.acquire("s1").await.unwrap();

        let handle = tokio::spawn(async move {
            let _p2 = map2.acquire("s1").await.unwrap();
            42
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        drop(p1);
        assert_eq!(handle.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let map = SessionLockMap::new();
        let _held = map.acquire("busy").await.unwrap();
        drop(map.acquire("idle").await.unwrap());
        map.prune_idle();
        assert_eq!(map.session_count(), 1);
    }
}
