use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{ThreadId, UserId};

/// A forum thread as reported by the chat platform.
///
/// Read-only to this crate; the platform owns its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// `None` when the platform could not resolve the owner.
    pub owner_id: Option<UserId>,
    /// Names of the forum tags applied to the thread
    #[serde(default)]
    pub applied_tags: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    /// Timestamp of the latest message, if known
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_activity_at: Option<OffsetDateTime>,
    /// Total messages including the opening one, when the platform reports it
    #[serde(default)]
    pub message_count: Option<u64>,
}

impl Thread {
    /// Last activity, falling back to creation time for silent threads.
    pub fn last_active(&self) -> OffsetDateTime {
        self.last_activity_at.unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub count: u64,
}

/// A message inside a thread. The opening message carries the thread's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Message {
    pub fn reaction_count(&self) -> u64 {
        self.reactions.iter().map(|r| r.count).sum()
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Engagement numbers for a thread, derived from its opening message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadStats {
    pub reaction_count: u64,
    pub reply_count: u64,
}

/// One matching thread, produced by the scanner and consumed by sorting.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub thread: Thread,
    pub stats: ThreadStats,
    pub first_message: Message,
}
