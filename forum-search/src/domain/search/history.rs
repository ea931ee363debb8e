use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::models::{ChannelId, UserId};

/// One finished search, as remembered for its user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub channel: ChannelId,
    pub required_tags: Vec<String>,
    /// Human-readable filter lines
    pub conditions: Vec<String>,
    pub results: usize,
    pub processed: usize,
    pub duration: Duration,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// Most recent searches per user, newest first.
pub struct SearchHistory {
    capacity: usize,
    entries: Mutex<HashMap<UserId, VecDeque<HistoryEntry>>>,
}

impl SearchHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, VecDeque<HistoryEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, user: UserId, entry: HistoryEntry) {
        let mut entries = self.lock();
        let history = entries.entry(user).or_default();
        history.push_front(entry);
        history.truncate(self.capacity);
    }

    pub fn recent(&self, user: UserId) -> Vec<HistoryEntry> {
        self.lock()
            .get(&user)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::new(10)
    }
}
