use async_trait::async_trait;

use crate::domain::{
    models::{Message, Thread},
    FetchError,
};

/// Outbound port for reading thread messages.
#[async_trait]
pub trait MessageSource: Send + Sync + 'static {
    /// Fetch the oldest message of the thread.
    async fn fetch_opening_message(&self, thread: &Thread) -> Result<Message, FetchError>;

    /// Count every message in the thread by walking its history.
    ///
    /// Only used when the platform does not report a message count.
    async fn count_messages(&self, thread: &Thread) -> Result<u64, FetchError>;
}
