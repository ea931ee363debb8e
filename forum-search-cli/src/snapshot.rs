//! A forum loaded from a JSON snapshot, standing in for the live platform.

use std::{collections::HashMap, path::Path};

use anyhow::Context;
use async_trait::async_trait;
use forum_search::domain::{
    models::{ChannelId, Message, Thread, ThreadId},
    ports::outbound::{MessageSource, ThreadSource},
    FetchError, SourceError,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Snapshot {
    pub channel: ChannelId,
    pub threads: Vec<SnapshotThread>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotThread {
    pub thread: Thread,
    /// Missing when the opening message was deleted
    #[serde(default)]
    pub opening_message: Option<Message>,
    #[serde(default)]
    pub replies: u64,
}

pub struct SnapshotForum {
    channel: ChannelId,
    active: Vec<Thread>,
    /// Newest activity first
    archived: Vec<Thread>,
    messages: HashMap<ThreadId, Message>,
    replies: HashMap<ThreadId, u64>,
}

impl SnapshotForum {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
        Ok(Self::new(snapshot))
    }

    pub fn new(snapshot: Snapshot) -> Self {
        let mut active = Vec::new();
        let mut archived = Vec::new();
        let mut messages = HashMap::new();
        let mut replies = HashMap::new();

        for entry in snapshot.threads {
            let id = entry.thread.id;
            if let Some(message) = entry.opening_message {
                messages.insert(id, message);
            }
            replies.insert(id, entry.replies);
            if entry.thread.archived {
                archived.push(entry.thread);
            } else {
                active.push(entry.thread);
            }
        }
        archived.sort_by_key(|thread| std::cmp::Reverse(thread.last_active()));

        Self {
            channel: snapshot.channel,
            active,
            archived,
            messages,
            replies,
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn thread_count(&self) -> usize {
        self.active.len() + self.archived.len()
    }

    fn check_channel(&self, channel: ChannelId) -> Result<(), SourceError> {
        if channel == self.channel {
            Ok(())
        } else {
            Err(SourceError::ChannelNotFound(channel))
        }
    }
}

#[async_trait]
impl ThreadSource for SnapshotForum {
    async fn list_active_threads(&self, channel: ChannelId) -> Result<Vec<Thread>, SourceError> {
        self.check_channel(channel)?;
        Ok(self.active.clone())
    }

    async fn list_archived_threads(
        &self,
        channel: ChannelId,
        limit: usize,
        before: Option<&Thread>,
    ) -> Result<Vec<Thread>, SourceError> {
        self.check_channel(channel)?;
        let start = match before {
            Some(cursor) => match self.archived.iter().position(|t| t.id == cursor.id) {
                Some(index) => index + 1,
                None => return Ok(Vec::new()),
            },
            None => 0,
        };
        Ok(self.archived.iter().skip(start).take(limit).cloned().collect())
    }
}

#[async_trait]
impl MessageSource for SnapshotForum {
    async fn fetch_opening_message(&self, thread: &Thread) -> Result<Message, FetchError> {
        self.messages
            .get(&thread.id)
            .cloned()
            .ok_or(FetchError::NotFound)
    }

    async fn count_messages(&self, thread: &Thread) -> Result<u64, FetchError> {
        Ok(1 + self.replies.get(&thread.id).copied().unwrap_or(0))
    }
}
