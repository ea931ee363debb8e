use std::time::Duration;

use thiserror::Error;

use super::models::{ChannelId, ThreadId};

/// Errors returned by a [`MessageSource`](super::ports::outbound::MessageSource).
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("message not found")]
    NotFound,
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error (status {status})")]
    Server { status: u16 },
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Rate limits and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Server { status } => (500..600).contains(status),
            Self::NotFound | Self::Other(_) => false,
        }
    }
}

/// Errors returned by a [`ThreadSource`](super::ports::outbound::ThreadSource).
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error (status {status})")]
    Server { status: u16 },
    #[error("{0}")]
    Other(String),
}

/// Failure to evaluate one thread. Never aborts the surrounding search.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to fetch opening message of thread {thread}: {source}")]
    Fetch {
        thread: ThreadId,
        #[source]
        source: FetchError,
    },
    #[error("gave up on thread {thread} after {attempts} attempts: {last}")]
    RetriesExhausted {
        thread: ThreadId,
        attempts: u32,
        last: FetchError,
    },
    #[error("retry budget of {budget:?} exceeded for thread {thread}")]
    RetryBudgetExceeded { thread: ThreadId, budget: Duration },
}

/// Errors that make a whole search meaningless.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("forum channel {0} not found")]
    ChannelNotFound(ChannelId),
}

#[derive(Debug, Error)]
#[error("failed to render progress: {0}")]
pub struct ProgressError(pub String);

pub type Result<T> = std::result::Result<T, SearchError>;
