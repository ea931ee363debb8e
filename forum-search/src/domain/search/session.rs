//! Registry of in-flight searches.
//!
//! Each search registers a cancellation token under a fresh [`SearchId`].
//! The returned guard unregisters it on drop, so sessions are released on
//! every exit path; a periodic sweep reclaims anything older than the
//! maximum age.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::models::SearchId;

struct Session {
    cancel: CancellationToken,
    started_at: Instant,
}

#[derive(Default)]
pub struct SearchSessions {
    sessions: Mutex<HashMap<SearchId, Session>>,
}

impl SearchSessions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SearchId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new search.
    pub fn open(self: &Arc<Self>) -> SessionGuard {
        let id = SearchId::generate();
        let cancel = CancellationToken::new();
        self.lock().insert(
            id,
            Session {
                cancel: cancel.clone(),
                started_at: Instant::now(),
            },
        );
        debug!(search = %id, "Search session opened");

        SessionGuard {
            id,
            cancel,
            sessions: Arc::clone(self),
        }
    }

    /// Signal cancellation. Returns `false` for unknown or finished searches.
    pub fn cancel(&self, id: SearchId) -> bool {
        match self.lock().get(&id) {
            Some(session) => {
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, id: SearchId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel and forget sessions older than `max_age`. Returns how many.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|id, session| {
            let stale = session.started_at.elapsed() > max_age;
            if stale {
                debug!(search = %id, "Reclaiming stale search session");
                session.cancel.cancel();
            }
            !stale
        });
        before - sessions.len()
    }

    pub fn start_sweep_task(
        self: Arc<Self>,
        every: Duration,
        max_age: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = self.sweep(max_age);
                        if removed > 0 {
                            info!(removed, "Swept stale search sessions");
                        }
                    }
                }
            }
        })
    }

    fn close(&self, id: SearchId) {
        if self.lock().remove(&id).is_some() {
            debug!(search = %id, "Search session closed");
        }
    }
}

/// Handle of one registered search; unregisters it when dropped.
pub struct SessionGuard {
    id: SearchId,
    cancel: CancellationToken,
    sessions: Arc<SearchSessions>,
}

impl SessionGuard {
    pub fn id(&self) -> SearchId {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.close(self.id);
    }
}
