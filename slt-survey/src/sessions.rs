//! In-memory session registry
//!
//! Each session sits behind its own mutex so events for one participant are
//! applied one at a time, while different participants never contend on
//! anything but the map lookup. Nothing here outlives the process.
//!
//! Sessions nobody has touched for the idle timeout are dropped by a periodic
//! sweep; like an explicit abandon, eviction persists nothing.

use slt_common::config::DEFAULT_MAX_SESSIONS;
use slt_common::{Catalog, SessionState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Handle to one session's state
pub type SessionHandle = Arc<Mutex<SessionState>>;

struct SessionEntry {
    state: SessionHandle,
    last_touched: Instant,
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    max_sessions: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry refusing new sessions once `max_sessions` are open
    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions,
        }
    }

    /// Start a fresh session and return its id; `None` when the registry is full
    pub async fn create(&self, catalog: &Catalog) -> Option<Uuid> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            tracing::warn!(open = sessions.len(), "Session limit reached");
            return None;
        }

        let session = SessionState::new(catalog);
        let id = session.id;
        sessions.insert(
            id,
            SessionEntry {
                state: Arc::new(Mutex::new(session)),
                last_touched: Instant::now(),
            },
        );
        tracing::info!(session_id = %id, "Session started");
        Some(id)
    }

    /// Look up a session and mark it as touched
    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_touched = Instant::now();
        Some(entry.state.clone())
    }

    /// Drop a session without persisting anything
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Session abandoned");
        }
        removed
    }

    /// Drop every session last touched at or before `cutoff`.
    ///
    /// Sessions whose handle is held by a request (e.g. a submission waiting
    /// on the sink) are kept regardless of age. Returns the number dropped.
    pub async fn evict_untouched_since(&self, cutoff: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep = entry.last_touched > cutoff || Arc::strong_count(&entry.state) > 1;
            if !keep {
                tracing::info!(session_id = %id, "Session expired");
            }
            keep
        });
        before - sessions.len()
    }

    /// Drop sessions idle for at least `max_idle`
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        match Instant::now().checked_sub(max_idle) {
            Some(cutoff) => self.evict_untouched_since(cutoff).await,
            None => 0,
        }
    }

    /// Sweep idle sessions every `period` until the task is dropped
    pub async fn run_idle_sweep(self, max_idle: Duration, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = self.evict_idle(max_idle).await;
            if evicted > 0 {
                let open = self.len().await;
                tracing::debug!(evicted, open, "Idle session sweep");
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
