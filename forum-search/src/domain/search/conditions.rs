use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{macros::format_description, Date, Duration, OffsetDateTime, Time};

use super::parser::{evaluate, parse_query, QueryNode};
use crate::domain::models::{Thread, UserId};

/// Raw search input as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub query: Option<String>,
    /// Comma-separated plain substrings
    pub exclude_keywords: Option<String>,
    pub author: Option<UserId>,
    pub exclude_author: Option<UserId>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub min_reactions: Option<u64>,
    pub min_replies: Option<u64>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionsError {
    #[error("could not parse start date: {0}")]
    InvalidStartDate(String),
    #[error("could not parse end date: {0}")]
    InvalidEndDate(String),
}

impl ConditionsError {
    /// Hint shown to users next to the error.
    pub fn hint(&self) -> &'static str {
        "Use YYYY-MM-DD or a relative date such as 7d, 2w, 3m or 1y"
    }
}

/// A keyword query together with its parsed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub raw: String,
    pub tree: QueryNode,
}

impl SearchQuery {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.trim().to_string(),
            tree: parse_query(raw),
        }
    }
}

/// Validated filter set for one search. Immutable once built.
///
/// An all-empty value matches every thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchConditions {
    pub required_tags: BTreeSet<String>,
    pub excluded_tags: BTreeSet<String>,
    pub query: Option<SearchQuery>,
    pub excluded_keywords: Vec<String>,
    pub author: Option<UserId>,
    pub excluded_author: Option<UserId>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
    pub min_reactions: Option<u64>,
    pub min_replies: Option<u64>,
}

impl SearchConditions {
    /// Normalise raw input. `now` anchors relative dates like `7d`.
    pub fn from_request(
        request: &SearchRequest,
        now: OffsetDateTime,
    ) -> Result<Self, ConditionsError> {
        let start_date = match non_empty(request.start_date.as_deref()) {
            Some(raw) => Some(
                parse_date(raw, now).ok_or_else(|| ConditionsError::InvalidStartDate(raw.into()))?,
            ),
            None => None,
        };

        // The end date covers its whole day
        let end_date = match non_empty(request.end_date.as_deref()) {
            Some(raw) => Some(
                parse_date(raw, now)
                    .and_then(|date| {
                        date.checked_add(Duration::days(1) - Duration::microseconds(1))
                    })
                    .ok_or_else(|| ConditionsError::InvalidEndDate(raw.into()))?,
            ),
            None => None,
        };

        let query = non_empty(request.query.as_deref()).map(SearchQuery::parse);

        Ok(Self {
            required_tags: normalize_tags(&request.tags),
            excluded_tags: normalize_tags(&request.exclude_tags),
            query,
            excluded_keywords: split_keywords(request.exclude_keywords.as_deref().unwrap_or("")),
            author: request.author,
            excluded_author: request.exclude_author,
            start_date,
            end_date,
            min_reactions: request.min_reactions,
            min_replies: request.min_replies,
        })
    }

    pub fn in_date_range(&self, thread: &Thread) -> bool {
        if self.start_date.is_some_and(|start| thread.created_at < start) {
            return false;
        }
        !self.end_date.is_some_and(|end| thread.created_at > end)
    }

    /// Author filters. An unknown owner passes both.
    pub fn author_allowed(&self, thread: &Thread) -> bool {
        let Some(owner) = thread.owner_id else {
            return true;
        };
        if self.author.is_some_and(|author| author != owner) {
            return false;
        }
        self.excluded_author != Some(owner)
    }

    pub fn has_keyword_filters(&self) -> bool {
        self.query.is_some() || !self.excluded_keywords.is_empty()
    }

    /// Excluded keywords first, then the boolean query.
    pub fn content_matches(&self, content: &str) -> bool {
        if !self.excluded_keywords.is_empty() {
            let lowered = content.to_lowercase();
            if self
                .excluded_keywords
                .iter()
                .any(|keyword| lowered.contains(keyword.as_str()))
            {
                return false;
            }
        }

        match &self.query {
            Some(query) => evaluate(&query.tree, content),
            None => true,
        }
    }

    /// One line per active filter, for progress and result headers.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let date_format = format_description!("[year]-[month]-[day]");
        let date = |value: OffsetDateTime| {
            value
                .format(date_format)
                .unwrap_or_else(|_| value.date().to_string())
        };

        if !self.required_tags.is_empty() {
            lines.push(format!("Tags: {}", join(&self.required_tags)));
        }
        if !self.excluded_tags.is_empty() {
            lines.push(format!("Excluded tags: {}", join(&self.excluded_tags)));
        }
        if let Some(query) = &self.query {
            lines.push(format!("Keywords: {}", query.raw));
        }
        if !self.excluded_keywords.is_empty() {
            lines.push(format!("Excluded words: {}", self.excluded_keywords.join(", ")));
        }
        if let Some(author) = self.author {
            lines.push(format!("Author: {author}"));
        }
        if let Some(author) = self.excluded_author {
            lines.push(format!("Excluded author: {author}"));
        }
        if let Some(start) = self.start_date {
            lines.push(format!("From: {}", date(start)));
        }
        if let Some(end) = self.end_date {
            lines.push(format!("Until: {}", date(end)));
        }
        if let Some(min) = self.min_reactions {
            lines.push(format!("Min reactions: {min}"));
        }
        if let Some(min) = self.min_replies {
            lines.push(format!("Min replies: {min}"));
        }
        lines
    }
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn normalize_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

/// Absolute dates are midnight UTC. Relative dates (`7d`, `2w`, `3m`, `1y`)
/// count back from `now`, with months as 30 days and years as 365.
pub fn parse_date(raw: &str, now: OffsetDateTime) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    let formats = [
        format_description!("[year]-[month padding:none]-[day padding:none]"),
        format_description!("[year]/[month padding:none]/[day padding:none]"),
        format_description!("[month padding:none]/[day padding:none]/[year]"),
        format_description!("[day padding:none].[month padding:none].[year]"),
    ];

    if let Some(date) = formats
        .iter()
        .find_map(|format| Date::parse(raw, *format).ok())
    {
        return Some(date.with_time(Time::MIDNIGHT).assume_utc());
    }

    parse_relative(raw).and_then(|offset| now.checked_sub(offset))
}

fn parse_relative(raw: &str) -> Option<Duration> {
    let lowered = raw.to_lowercase();
    let unit = lowered.chars().last()?;
    let digits = &lowered[..lowered.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let amount: i64 = digits.parse().ok()?;

    let days = match unit {
        'd' => amount,
        'w' => amount.checked_mul(7)?,
        'm' => amount.checked_mul(30)?,
        'y' => amount.checked_mul(365)?,
        _ => return None,
    };
    Some(Duration::seconds(days.checked_mul(86_400)?))
}
