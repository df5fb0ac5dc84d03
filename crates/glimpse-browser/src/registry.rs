//! Process-wide session registry.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::chrome;
use crate::error::BrowserError;
use crate::session::Session;

/// Maps session ids to live [`Session`]s.
///
/// Closed sessions (expired, deleted, or self-exited) are invisible to
/// `get` and `list` and are purged lazily.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .iter()
            .filter(|e| !e.value().is_closed())
            .count()
    }

    /// Whether the registry has no live sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Launch a new browser session and store it.
    ///
    /// The Chrome binary is located per request so a binary installed after
    /// server start is picked up; a missing binary fails only this call.
    pub async fn create(&self, lifetime: Duration) -> Result<Arc<Session>, BrowserError> {
        let chrome_path = chrome::find_chrome().ok_or(BrowserError::ChromeNotFound)?;
        let session = Session::launch(&chrome_path, lifetime).await.map_err(|e| {
            tracing::error!(error = %e, "browser session creation failed");
            e
        })?;
        self.sessions
            .insert(session.id().to_string(), Arc::clone(&session));
        metrics::gauge!("browser_sessions_active").increment(1.0);
        metrics::counter!("browser_sessions_created_total").increment(1);
        Ok(session)
    }

    /// Look up a live session. Closed sessions read as absent and are purged.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.get(id).map(|e| Arc::clone(e.value()))?;
        if session.is_closed() {
            self.purge(id);
            return None;
        }
        Some(session)
    }

    /// Snapshot of the live sessions. Enumeration order is unspecified.
    pub fn list(&self) -> Vec<Arc<Session>> {
        let snapshot: Vec<Arc<Session>> =
            self.sessions.iter().map(|e| Arc::clone(e.value())).collect();
        let mut live = Vec::with_capacity(snapshot.len());
        for session in snapshot {
            if session.is_closed() {
                self.purge(session.id());
            } else {
                live.push(session);
            }
        }
        live
    }

    /// Stop a session and remove it.
    ///
    /// Stops before removing, so a concurrent `get` racing this delete can
    /// never observe a reaped subprocess behind an open closed-flag.
    /// Returns `false` when no live session exists under `id`.
    pub async fn delete(&self, id: &str) -> bool {
        let Some(session) = self.get(id) else {
            return false;
        };
        session.stop().await;
        self.purge(id);
        true
    }

    /// Stop every live session. Used on server shutdown so no subprocess or
    /// profile directory outlives the process.
    pub async fn shutdown_all(&self) {
        let snapshot: Vec<Arc<Session>> =
            self.sessions.iter().map(|e| Arc::clone(e.value())).collect();
        for session in snapshot {
            session.stop().await;
        }
        self.sessions.clear();
    }

    fn purge(&self, id: &str) {
        if self.sessions.remove(id).is_some() {
            metrics::gauge!("browser_sessions_active").decrement(1.0);
        }
    }
}
