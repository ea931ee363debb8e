use async_trait::async_trait;

use crate::domain::{
    models::{ChannelId, Thread},
    SourceError,
};

/// Outbound port for listing the threads of a forum channel.
///
/// Implemented by the chat-platform integration; the core never mutates threads.
#[async_trait]
pub trait ThreadSource: Send + Sync + 'static {
    /// All currently active (open) threads of the channel.
    ///
    /// Must return [`SourceError::ChannelNotFound`] when the channel does not exist.
    async fn list_active_threads(&self, channel: ChannelId) -> Result<Vec<Thread>, SourceError>;

    /// One page of archived threads, newest first.
    ///
    /// `before` is the last thread seen on the previous page; `None` starts at
    /// the most recently archived thread. An empty page means the list is exhausted.
    async fn list_archived_threads(
        &self,
        channel: ChannelId,
        limit: usize,
        before: Option<&Thread>,
    ) -> Result<Vec<Thread>, SourceError>;
}
