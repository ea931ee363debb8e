use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::domain::models::SearchResult;

/// How search results are ordered. Applied once, after scanning finishes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    #[strum(to_string = "reactions_desc", serialize = "top")]
    ReactionsDesc,
    ReactionsAsc,
    RepliesDesc,
    RepliesAsc,
    #[strum(to_string = "created_desc", serialize = "newest")]
    CreatedDesc,
    #[strum(to_string = "created_asc", serialize = "oldest")]
    CreatedAsc,
    #[strum(to_string = "last_active_desc", serialize = "active")]
    LastActiveDesc,
    LastActiveAsc,
}

impl SortOrder {
    /// Lenient parse used at the user boundary: unknown names fall back to
    /// newest-first instead of failing the search.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Self::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::debug!(order = raw, "Unknown sort order, using created_desc");
                Self::CreatedDesc
            }),
        }
    }

    fn compare(self, a: &SearchResult, b: &SearchResult) -> Ordering {
        match self {
            Self::ReactionsDesc => b.stats.reaction_count.cmp(&a.stats.reaction_count),
            Self::ReactionsAsc => a.stats.reaction_count.cmp(&b.stats.reaction_count),
            Self::RepliesDesc => b.stats.reply_count.cmp(&a.stats.reply_count),
            Self::RepliesAsc => a.stats.reply_count.cmp(&b.stats.reply_count),
            Self::CreatedDesc => b.thread.created_at.cmp(&a.thread.created_at),
            Self::CreatedAsc => a.thread.created_at.cmp(&b.thread.created_at),
            Self::LastActiveDesc => b.thread.last_active().cmp(&a.thread.last_active()),
            Self::LastActiveAsc => a.thread.last_active().cmp(&b.thread.last_active()),
        }
    }

    /// Stable sort: ties keep their scan order.
    pub fn sort(self, results: &mut [SearchResult]) {
        results.sort_by(|a, b| self.compare(a, b));
    }
}
