//! In-memory forum for tests.
//!
//! Implements both [`ThreadSource`] and [`MessageSource`] with scripted
//! failures, an artificial fetch delay and call/concurrency counters.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::domain::{
    models::{ChannelId, Message, Reaction, Thread, ThreadId, UserId},
    ports::outbound::{MessageSource, ProgressSink, SearchProgress, ThreadSource},
    FetchError, ProgressError, SourceError,
};

/// A thread plus its opening message, built fluently.
#[derive(Debug, Clone)]
pub struct MockThread {
    pub thread: Thread,
    pub message: Message,
    /// Messages after the opening one, reported by `count_messages`
    pub replies: u64,
}

impl MockThread {
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.thread.applied_tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_reactions(mut self, count: u64) -> Self {
        self.message.reactions = vec![Reaction {
            emoji: "👍".to_string(),
            count,
        }];
        self
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.message.content = content.to_string();
        self
    }

    pub fn with_owner(mut self, owner: u64) -> Self {
        self.thread.owner_id = Some(UserId::new(owner));
        self
    }

    /// Platform-reported message count, opening message included.
    pub fn with_message_count(mut self, count: u64) -> Self {
        self.thread.message_count = Some(count);
        self
    }

    pub fn with_replies(mut self, replies: u64) -> Self {
        self.replies = replies;
        self
    }

    pub fn created_at(mut self, at: OffsetDateTime) -> Self {
        self.thread.created_at = at;
        self
    }
}

#[derive(Default)]
pub struct MockForum {
    channel: ChannelId,
    active: Vec<Thread>,
    /// Newest first
    archived: Vec<Thread>,
    messages: HashMap<ThreadId, Message>,
    replies: HashMap<ThreadId, u64>,
    fetch_errors: Mutex<HashMap<ThreadId, VecDeque<FetchError>>>,
    panicking: HashSet<ThreadId>,
    failing_counts: bool,
    active_error: Option<SourceError>,
    /// Per-call outcome of archived page requests; `None` serves the page
    archive_script: Mutex<VecDeque<Option<SourceError>>>,
    fetch_delay: Duration,
    cancel_after: Option<(usize, CancellationToken)>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetch_calls: AtomicUsize,
    count_calls: AtomicUsize,
    archive_calls: AtomicUsize,
}

impl MockForum {
    pub fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            ..Default::default()
        }
    }

    /// Thread `id` created `id` minutes after 2024-01-01, with a short opening message.
    pub fn thread(id: u64) -> MockThread {
        let created_at = time::macros::datetime!(2024-01-01 0:00 UTC)
            + time::Duration::minutes(id as i64);
        MockThread {
            thread: Thread {
                id: ThreadId::new(id),
                name: format!("Thread {id}"),
                created_at,
                owner_id: None,
                applied_tags: vec![],
                archived: false,
                last_activity_at: None,
                message_count: None,
            },
            message: Message {
                id,
                content: format!("opening message of thread {id}"),
                reactions: vec![],
            },
            replies: 0,
        }
    }

    fn add(&mut self, mock: MockThread) -> Thread {
        let id = mock.thread.id;
        self.messages.insert(id, mock.message);
        self.replies.insert(id, mock.replies);
        mock.thread
    }

    pub fn with_active(mut self, threads: impl IntoIterator<Item = MockThread>) -> Self {
        for mock in threads {
            let thread = self.add(mock);
            self.active.push(thread);
        }
        self
    }

    /// Archived threads, given newest first.
    pub fn with_archived(mut self, threads: impl IntoIterator<Item = MockThread>) -> Self {
        for mut mock in threads {
            mock.thread.archived = true;
            let thread = self.add(mock);
            self.archived.push(thread);
        }
        self
    }

    pub fn without_message(mut self, id: u64) -> Self {
        self.messages.remove(&ThreadId::new(id));
        self
    }

    /// Errors returned, in order, by the next fetches of thread `id`.
    pub fn with_fetch_errors(
        self,
        id: u64,
        errors: impl IntoIterator<Item = FetchError>,
    ) -> Self {
        self.fetch_errors
            .lock()
            .unwrap()
            .insert(ThreadId::new(id), errors.into_iter().collect());
        self
    }

    pub fn with_panicking_fetch(mut self, id: u64) -> Self {
        self.panicking.insert(ThreadId::new(id));
        self
    }

    pub fn failing_counts(mut self) -> Self {
        self.failing_counts = true;
        self
    }

    pub fn with_active_error(mut self, error: SourceError) -> Self {
        self.active_error = Some(error);
        self
    }

    /// Errors returned, in order, by the next archived page requests.
    pub fn with_archive_errors(self, errors: impl IntoIterator<Item = SourceError>) -> Self {
        self.with_archive_script(errors.into_iter().map(Some))
    }

    /// Scripted outcomes of the next archived page requests, `None` meaning success.
    pub fn with_archive_script(
        self,
        script: impl IntoIterator<Item = Option<SourceError>>,
    ) -> Self {
        self.archive_script.lock().unwrap().extend(script);
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Cancel `token` once `fetches` opening messages have been fetched.
    pub fn cancel_after(mut self, fetches: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((fetches, token));
        self
    }

    pub fn active_threads(&self) -> Vec<Thread> {
        self.active.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn archive_calls(&self) -> usize {
        self.archive_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThreadSource for MockForum {
    async fn list_active_threads(&self, channel: ChannelId) -> Result<Vec<Thread>, SourceError> {
        if channel != self.channel {
            return Err(SourceError::ChannelNotFound(channel));
        }
        if let Some(error) = &self.active_error {
            return Err(error.clone());
        }
        Ok(self.active.clone())
    }

    async fn list_archived_threads(
        &self,
        channel: ChannelId,
        limit: usize,
        before: Option<&Thread>,
    ) -> Result<Vec<Thread>, SourceError> {
        self.archive_calls.fetch_add(1, Ordering::SeqCst);
        if channel != self.channel {
            return Err(SourceError::ChannelNotFound(channel));
        }
        if let Some(Some(error)) = self.archive_script.lock().unwrap().pop_front() {
            return Err(error);
        }

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
impl MessageSource for MockForum {
    async fn fetch_opening_message(&self, thread: &Thread) -> Result<Message, FetchError> {
        let calls = self.fetch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, token)) = &self.cancel_after {
            if calls >= *after {
                token.cancel();
            }
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(&thread.id) {
            panic!("scripted panic for thread {}", thread.id);
        }

        let scripted = self
            .fetch_errors
            .lock()
            .unwrap()
            .get_mut(&thread.id)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        self.messages
            .get(&thread.id)
            .cloned()
            .ok_or(FetchError::NotFound)
    }

    async fn count_messages(&self, thread: &Thread) -> Result<u64, FetchError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_counts {
            return Err(FetchError::Server { status: 500 });
        }
        Ok(1 + self.replies.get(&thread.id).copied().unwrap_or(0))
    }
}

/// Progress sink that records every update.
#[derive(Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<SearchProgress>>,
    failing: bool,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn updates(&self) -> Vec<SearchProgress> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressSink for RecordingProgress {
    async fn render(&self, progress: &SearchProgress) -> Result<(), ProgressError> {
        self.updates.lock().unwrap().push(progress.clone());
        if self.failing {
            return Err(ProgressError("message deleted".to_string()));
        }
        Ok(())
    }
}
