//! Per-thread filter pipeline.
//!
//! Cheap checks (date, author, tags) run before the opening message is
//! fetched; statistics are computed last and cached. Every pipeline holds one
//! permit of a shared semaphore, which bounds outbound requests.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use super::{conditions::SearchConditions, tags::TagMatcher};
use crate::{
    cache::ThreadCache,
    domain::{
        models::{Message, SearchResult, Thread, ThreadStats},
        ports::outbound::MessageSource,
        FetchError, ScanError,
    },
};

/// Batches up to this size are scanned one thread at a time.
const SEQUENTIAL_BATCH_LIMIT: usize = 3;

/// Retry schedule for opening-message fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Upper bound on the total time slept for one thread
    pub max_total_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            max_total_wait: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub concurrency_limit: usize,
    pub tag_memo_capacity: u64,
    pub retry: RetryPolicy,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            tag_memo_capacity: 256,
            retry: RetryPolicy::default(),
        }
    }
}

/// Why a thread did not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OutsideDateRange,
    Author,
    Tags,
    OpeningMessageMissing,
    NoContent,
    Keywords,
    BelowMinReactions,
    BelowMinReplies,
}

/// Outcome of scanning one thread. Failures are reported separately as [`ScanError`].
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Matched(Box<SearchResult>),
    Rejected(Rejection),
    Cancelled,
}

enum Fetched {
    Message(Message),
    NotFound,
    Cancelled,
}

/// Evaluates threads against [`SearchConditions`].
///
/// Cheap to clone; clones share the semaphore, tag memo and cache.
pub struct ThreadScanner<M> {
    messages: Arc<M>,
    cache: ThreadCache,
    tags: TagMatcher,
    semaphore: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl<M> Clone for ThreadScanner<M> {
    fn clone(&self) -> Self {
        Self {
            messages: Arc::clone(&self.messages),
            cache: self.cache.clone(),
            tags: self.tags.clone(),
            semaphore: Arc::clone(&self.semaphore),
            retry: self.retry,
        }
    }
}

impl<M: MessageSource> ThreadScanner<M> {
    pub fn new(messages: Arc<M>, cache: ThreadCache, config: ScannerConfig) -> Self {
        Self {
            messages,
            cache,
            tags: TagMatcher::new(config.tag_memo_capacity),
            semaphore: Arc::new(Semaphore::new(config.concurrency_limit.max(1))),
            retry: config.retry,
        }
    }

    /// Permits not currently held by a pipeline.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run the full pipeline for one thread.
    pub async fn scan_thread(
        &self,
        thread: &Thread,
        conditions: &SearchConditions,
        cancel: &CancellationToken,
    ) -> Result<Verdict, ScanError> {
        if cancel.is_cancelled() {
            return Ok(Verdict::Cancelled);
        }

        let _permit = tokio::select! {
            _ = cancel.cancelled() => return Ok(Verdict::Cancelled),
            permit = self.semaphore.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return Ok(Verdict::Cancelled),
            },
        };

        if !conditions.in_date_range(thread) {
            return Ok(Verdict::Rejected(Rejection::OutsideDateRange));
        }
        if !conditions.author_allowed(thread) {
            return Ok(Verdict::Rejected(Rejection::Author));
        }
        if !self.tags.matches(
            &thread.applied_tags,
            &conditions.required_tags,
            &conditions.excluded_tags,
        ) {
            return Ok(Verdict::Rejected(Rejection::Tags));
        }

        let message = match self.fetch_opening_message(thread, cancel).await? {
            Fetched::Message(message) => message,
            Fetched::NotFound => return Ok(Verdict::Rejected(Rejection::OpeningMessageMissing)),
            Fetched::Cancelled => return Ok(Verdict::Cancelled),
        };

        if message.has_content() {
            if conditions.has_keyword_filters() && !conditions.content_matches(&message.content) {
                return Ok(Verdict::Rejected(Rejection::Keywords));
            }
        } else if conditions.query.is_some() {
            return Ok(Verdict::Rejected(Rejection::NoContent));
        }

        if cancel.is_cancelled() {
            return Ok(Verdict::Cancelled);
        }

        let stats = self.thread_stats(thread, &message).await;
        if conditions
            .min_reactions
            .is_some_and(|min| stats.reaction_count < min)
        {
            return Ok(Verdict::Rejected(Rejection::BelowMinReactions));
        }
        if conditions
            .min_replies
            .is_some_and(|min| stats.reply_count < min)
        {
            return Ok(Verdict::Rejected(Rejection::BelowMinReplies));
        }

        Ok(Verdict::Matched(Box::new(SearchResult {
            thread: thread.clone(),
            stats,
            first_message: message,
        })))
    }

    /// Scan a batch, returning the matches in no guaranteed order.
    ///
    /// Small batches run sequentially; larger ones spawn one task per thread.
    /// Failed or panicked pipelines are logged and dropped.
    pub async fn scan_batch(
        &self,
        threads: &[Thread],
        conditions: &Arc<SearchConditions>,
        cancel: &CancellationToken,
    ) -> Vec<SearchResult> {
        if threads.len() <= SEQUENTIAL_BATCH_LIMIT {
            let mut results = Vec::new();
            for thread in threads {
                if cancel.is_cancelled() {
                    break;
                }
                if let Some(result) = self.scan_logged(thread, conditions, cancel).await {
                    results.push(result);
                }
            }
            return results;
        }

        let handles: Vec<_> = threads
            .iter()
            .take_while(|_| !cancel.is_cancelled())
            .map(|thread| {
                let scanner = self.clone();
                let thread = thread.clone();
                let conditions = Arc::clone(conditions);
                let cancel = cancel.clone();
                tokio::spawn(async move { scanner.scan_logged(&thread, &conditions, &cancel).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "Thread scan task failed");
                    None
                }
            })
            .collect()
    }

    async fn scan_logged(
        &self,
        thread: &Thread,
        conditions: &SearchConditions,
        cancel: &CancellationToken,
    ) -> Option<SearchResult> {
        match self.scan_thread(thread, conditions, cancel).await {
            Ok(Verdict::Matched(result)) => Some(*result),
            Ok(Verdict::Rejected(reason)) => {
                trace!(thread = %thread.id, ?reason, "Thread rejected");
                None
            }
            Ok(Verdict::Cancelled) => None,
            Err(e) => {
                warn!(thread = %thread.id, error = %e, "Skipping thread");
                None
            }
        }
    }

    async fn fetch_opening_message(
        &self,
        thread: &Thread,
        cancel: &CancellationToken,
    ) -> Result<Fetched, ScanError> {
        let mut attempt: u32 = 0;
        let mut waited = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return Ok(Fetched::Cancelled);
            }

            let error = match self.messages.fetch_opening_message(thread).await {
                Ok(message) => return Ok(Fetched::Message(message)),
                Err(FetchError::NotFound) => return Ok(Fetched::NotFound),
                Err(e) if e.is_retryable() => e,
                Err(e) => {
                    return Err(ScanError::Fetch {
                        thread: thread.id,
                        source: e,
                    })
                }
            };

            if attempt >= self.retry.max_retries {
                return Err(ScanError::RetriesExhausted {
                    thread: thread.id,
                    attempts: attempt + 1,
                    last: error,
                });
            }
            attempt += 1;

            let backoff = Duration::from_secs(u64::from(attempt));
            let delay = match &error {
                FetchError::RateLimited { retry_after } => retry_after
                    .filter(|after| !after.is_zero())
                    .unwrap_or(backoff),
                _ => backoff,
            };

            if waited + delay > self.retry.max_total_wait {
                return Err(ScanError::RetryBudgetExceeded {
                    thread: thread.id,
                    budget: self.retry.max_total_wait,
                });
            }
            waited += delay;

            warn!(
                thread = %thread.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying opening message fetch"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Ok(Fetched::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn thread_stats(&self, thread: &Thread, opening: &Message) -> ThreadStats {
        if let Some(stats) = self.cache.get_stats(thread.id).await {
            return stats;
        }

        let reply_count = match thread.message_count {
            Some(count) => count.saturating_sub(1),
            None => match self.messages.count_messages(thread).await {
                Ok(count) => count.saturating_sub(1),
                Err(e) => {
                    warn!(thread = %thread.id, error = %e, "Failed to count replies");
                    0
                }
            },
        };

        let stats = ThreadStats {
            reaction_count: opening.reaction_count(),
            reply_count,
        };
        debug!(thread = %thread.id, ?stats, "Computed thread stats");
        self.cache.set_stats(thread.id, stats).await;
        stats
    }
}
