use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{
    conditions::{SearchConditions, SearchRequest},
    history::{HistoryEntry, SearchHistory},
    orchestrator::{SearchOrchestrator, Termination},
    pagination::Pages,
    session::{SearchSessions, SessionGuard},
    sort::SortOrder,
};
use crate::domain::{
    models::{ChannelId, SearchResult, UserId},
    ports::outbound::{MessageSource, ProgressSink, ThreadSource},
    SearchError,
};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub results_per_page: usize,
    pub history_length: usize,
    pub session_max_age: Duration,
    pub session_sweep_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            results_per_page: 5,
            history_length: 10,
            session_max_age: Duration::from_secs(600),
            session_sweep_interval: Duration::from_secs(300),
        }
    }
}

/// Counts and filters shown alongside any outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSummary {
    pub conditions: Vec<String>,
    pub order: SortOrder,
    pub processed: usize,
    pub matched: usize,
    pub termination: Termination,
    pub elapsed: Duration,
}

impl SearchSummary {
    pub fn status_line(&self) -> String {
        let secs = self.elapsed.as_secs_f64();
        let note = match self.termination {
            Termination::Completed => "",
            Termination::CapReached => " (result cap reached)",
            Termination::Cancelled => " (cancelled)",
            Termination::ArchiveErrors => " (archive partially unavailable)",
        };
        format!(
            "Processed {} threads, {} matched in {secs:.1}s{note}",
            self.processed, self.matched
        )
    }
}

/// Everything a search can end in. Internal errors never leak past this.
#[derive(Debug)]
pub enum SearchOutcome {
    Results {
        pages: Pages<SearchResult>,
        summary: SearchSummary,
    },
    NoResults {
        summary: SearchSummary,
    },
    /// Cancelled by the user or a timeout; carries what was found so far
    Cancelled {
        pages: Pages<SearchResult>,
        summary: SearchSummary,
    },
    InvalidInput {
        message: String,
    },
    Failed {
        message: String,
    },
}

impl SearchOutcome {
    pub fn summary(&self) -> Option<&SearchSummary> {
        match self {
            Self::Results { summary, .. }
            | Self::NoResults { summary }
            | Self::Cancelled { summary, .. } => Some(summary),
            Self::InvalidInput { .. } | Self::Failed { .. } => None,
        }
    }

    pub fn pages(&self) -> Option<&Pages<SearchResult>> {
        match self {
            Self::Results { pages, .. } | Self::Cancelled { pages, .. } => Some(pages),
            _ => None,
        }
    }

    /// Short user-facing message.
    pub fn headline(&self) -> String {
        match self {
            Self::Results { summary, .. } => format!("Search complete. {}", summary.status_line()),
            Self::NoResults { summary } => {
                format!("No threads matched. {}", summary.status_line())
            }
            Self::Cancelled { summary, .. } => {
                format!("Search cancelled. {}", summary.status_line())
            }
            Self::InvalidInput { message } => format!("Invalid search: {message}"),
            Self::Failed { message } => format!("Search failed: {message}"),
        }
    }
}

/// The search command boundary.
///
/// Validates input, runs the scan under a registered session, sorts,
/// remembers the search and pages the results.
pub struct ForumSearch<T, M> {
    orchestrator: SearchOrchestrator<T, M>,
    sessions: Arc<SearchSessions>,
    history: SearchHistory,
    config: ServiceConfig,
}

impl<T, M> ForumSearch<T, M>
where
    T: ThreadSource,
    M: MessageSource,
{
    pub fn new(orchestrator: SearchOrchestrator<T, M>, config: ServiceConfig) -> Self {
        Self {
            orchestrator,
            sessions: SearchSessions::new(),
            history: SearchHistory::new(config.history_length),
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SearchSessions> {
        &self.sessions
    }

    pub fn history(&self) -> &SearchHistory {
        &self.history
    }

    pub fn orchestrator(&self) -> &SearchOrchestrator<T, M> {
        &self.orchestrator
    }

    /// Register a search. Keep a clone of its token to cancel it later.
    pub fn open_session(&self) -> SessionGuard {
        self.sessions.open()
    }

    pub fn start_session_sweep(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        Arc::clone(&self.sessions).start_sweep_task(
            self.config.session_sweep_interval,
            self.config.session_max_age,
            shutdown,
        )
    }

    /// Run one search to completion. The session is released on return.
    pub async fn search(
        &self,
        session: SessionGuard,
        user: UserId,
        channel: ChannelId,
        request: &SearchRequest,
        progress: &dyn ProgressSink,
    ) -> SearchOutcome {
        let conditions = match SearchConditions::from_request(request, OffsetDateTime::now_utc()) {
            Ok(conditions) => Arc::new(conditions),
            Err(e) => {
                return SearchOutcome::InvalidInput {
                    message: format!("{e}. {}", e.hint()),
                }
            }
        };
        let order = SortOrder::parse_lenient(request.order.as_deref());

        info!(
            search = %session.id(),
            %user,
            %channel,
            %order,
            "Starting forum search"
        );

        let run = AssertUnwindSafe(self.orchestrator.run(
            channel,
            Arc::clone(&conditions),
            session.token(),
            progress,
        ))
        .catch_unwind()
        .await;

        let mut report = match run {
            Ok(Ok(report)) => report,
            Ok(Err(SearchError::ChannelNotFound(channel))) => {
                warn!(search = %session.id(), %channel, "Search target does not exist");
                return SearchOutcome::Failed {
                    message: format!("forum channel {channel} was not found"),
                };
            }
            Err(_) => {
                error!(search = %session.id(), "Search task panicked");
                return SearchOutcome::Failed {
                    message: "an unexpected error occurred".to_string(),
                };
            }
        };

        order.sort(&mut report.results);

        let summary = SearchSummary {
            conditions: conditions.describe(),
            order,
            processed: report.processed,
            matched: report.results.len(),
            termination: report.termination,
            elapsed: report.elapsed,
        };
        let pages = Pages::new(report.results, self.config.results_per_page);

        if report.termination == Termination::Cancelled {
            info!(search = %session.id(), matched = summary.matched, "Search cancelled");
            return SearchOutcome::Cancelled { pages, summary };
        }

        self.history.record(
            user,
            HistoryEntry {
                channel,
                required_tags: conditions.required_tags.iter().cloned().collect(),
                conditions: summary.conditions.clone(),
                results: summary.matched,
                processed: summary.processed,
                duration: summary.elapsed,
                recorded_at: OffsetDateTime::now_utc(),
            },
        );

        if pages.total_items() == 0 {
            SearchOutcome::NoResults { summary }
        } else {
            SearchOutcome::Results { pages, summary }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::{
        cache::CacheManager,
        domain::{
            ports::outbound::NoProgress,
            search::{
                mock::{MockForum, RecordingProgress},
                orchestrator::OrchestratorConfig,
                scanner::{ScannerConfig, ThreadScanner},
            },
            FetchError,
        },
    };

    const CHANNEL: ChannelId = ChannelId::new(1);
    const USER: UserId = UserId::new(42);

    fn service(forum: MockForum) -> (Arc<MockForum>, ForumSearch<MockForum, MockForum>) {
        service_with(forum, OrchestratorConfig::default())
    }

    fn service_with(
        forum: MockForum,
        config: OrchestratorConfig,
    ) -> (Arc<MockForum>, ForumSearch<MockForum, MockForum>) {
        let forum = Arc::new(forum);
        let scanner = ThreadScanner::new(
            Arc::clone(&forum),
            CacheManager::local().threads().clone(),
            ScannerConfig::default(),
        );
        let orchestrator = SearchOrchestrator::new(Arc::clone(&forum), scanner, config);
        (forum, ForumSearch::new(orchestrator, ServiceConfig::default()))
    }

    fn result_ids(outcome: &SearchOutcome) -> Vec<u64> {
        outcome
            .pages()
            .map(|pages| pages.items().iter().map(|r| r.thread.id.as_u64()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn scenario_bug_threads_sorted_by_reactions() {
        let threads = (1..=10).map(|id| {
            let thread = MockForum::thread(id);
            match id {
                2 => thread.with_tags(&["bug"]).with_reactions(5),
                5 => thread.with_tags(&["Bug", "ui"]).with_reactions(20),
                9 => thread.with_tags(&["bug"]).with_reactions(8),
                4 => thread.with_tags(&["bug"]).with_reactions(4),
                _ => thread.with_tags(&["question"]).with_reactions(50),
            }
        });
        let (_, service) = service(MockForum::new(CHANNEL).with_active(threads));
        let request = SearchRequest {
            tags: vec!["bug".to_string()],
            min_reactions: Some(5),
            ..Default::default()
        };

        let outcome = service
            .search(service.open_session(), USER, CHANNEL, &request, &NoProgress)
            .await;

        assert!(matches!(outcome, SearchOutcome::Results { .. }));
        assert_eq!(result_ids(&outcome), vec![5, 9, 2]);
        let summary = outcome.summary().unwrap();
        assert_eq!(summary.order, SortOrder::ReactionsDesc);
        assert_eq!(summary.processed, 10);
        assert!(service.sessions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_rate_limited_thread_is_included() {
        let forum = MockForum::new(CHANNEL)
            .with_active([MockForum::thread(1), MockForum::thread(2)])
            .with_fetch_errors(
                2,
                [FetchError::RateLimited {
                    retry_after: Some(Duration::from_secs(2)),
                }],
            );
        let (forum, service) = service(forum);

        let started = Instant::now();
        let outcome = service
            .search(
                service.open_session(),
                USER,
                CHANNEL,
                &SearchRequest::default(),
                &NoProgress,
            )
            .await;

        let mut ids = result_ids(&outcome);
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(forum.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn scenario_archived_cap() {
        let forum = MockForum::new(CHANNEL).with_archived((1..=200).rev().map(MockForum::thread));
        let (_, service) = service_with(
            forum,
            OrchestratorConfig {
                max_results: 50,
                ..Default::default()
            },
        );
        let progress = RecordingProgress::new();

        let outcome = service
            .search(
                service.open_session(),
                USER,
                CHANNEL,
                &SearchRequest::default(),
                &progress,
            )
            .await;

        let summary = outcome.summary().unwrap();
        assert_eq!(summary.matched, 50);
        assert_eq!(summary.termination, Termination::CapReached);
        assert_eq!(outcome.pages().unwrap().total_pages(), 10);
        assert!(outcome.headline().contains("result cap reached"));
    }

    #[tokio::test]
    async fn unknown_order_falls_back_to_newest_first() {
        let (_, service) = service(
            MockForum::new(CHANNEL).with_active((1..=4).map(MockForum::thread)),
        );
        let request = SearchRequest {
            order: Some("sideways".to_string()),
            ..Default::default()
        };

        let outcome = service
            .search(service.open_session(), USER, CHANNEL, &request, &NoProgress)
            .await;
        assert_eq!(result_ids(&outcome), vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn invalid_date_is_reported_without_scanning() {
        let (forum, service) = service(MockForum::new(CHANNEL).with_active([MockForum::thread(1)]));
        let request = SearchRequest {
            start_date: Some("next tuesday".to_string()),
            ..Default::default()
        };

        let outcome = service
            .search(service.open_session(), USER, CHANNEL, &request, &NoProgress)
            .await;

        let SearchOutcome::InvalidInput { message } = &outcome else {
            panic!("expected invalid input, got {outcome:?}");
        };
        assert!(message.contains("next tuesday"));
        assert_eq!(forum.fetch_calls(), 0);
        assert!(service.sessions().is_empty());
    }

    #[tokio::test]
    async fn far_past_relative_date_is_invalid_input() {
        let (forum, service) = service(MockForum::new(CHANNEL).with_active([MockForum::thread(1)]));
        for raw in ["100000y", "99999999999999d"] {
            let request = SearchRequest {
                start_date: Some(raw.to_string()),
                ..Default::default()
            };

            let outcome = service
                .search(service.open_session(), USER, CHANNEL, &request, &NoProgress)
                .await;

            let SearchOutcome::InvalidInput { message } = &outcome else {
                panic!("expected invalid input for {raw}, got {outcome:?}");
            };
            assert!(message.contains(raw));
        }
        assert_eq!(forum.fetch_calls(), 0);
        assert!(service.sessions().is_empty());
    }

    #[tokio::test]
    async fn missing_channel_becomes_a_failure_message() {
        let (_, service) = service(MockForum::new(CHANNEL));
        let outcome = service
            .search(
                service.open_session(),
                USER,
                ChannelId::new(2),
                &SearchRequest::default(),
                &NoProgress,
            )
            .await;

        let SearchOutcome::Failed { message } = &outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(message.contains("not found"));
        assert!(service.history().recent(USER).is_empty());
    }

    #[tokio::test]
    async fn panics_are_contained_and_resources_released() {
        let forum = MockForum::new(CHANNEL)
            .with_active([MockForum::thread(1)])
            .with_panicking_fetch(1);
        let (_, service) = service(forum);

        let outcome = service
            .search(
                service.open_session(),
                USER,
                CHANNEL,
                &SearchRequest::default(),
                &NoProgress,
            )
            .await;

        assert!(matches!(outcome, SearchOutcome::Failed { .. }));
        assert!(service.sessions().is_empty());
        assert_eq!(service.orchestrator().scanner().available_permits(), 5);
    }

    #[tokio::test]
    async fn no_matches_is_an_explicit_outcome() {
        let (_, service) = service(MockForum::new(CHANNEL).with_active([MockForum::thread(1)]));
        let request = SearchRequest {
            query: Some("nonexistent".to_string()),
            ..Default::default()
        };

        let outcome = service
            .search(service.open_session(), USER, CHANNEL, &request, &NoProgress)
            .await;
        assert!(matches!(outcome, SearchOutcome::NoResults { .. }));
        assert!(outcome.headline().starts_with("No threads matched"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_search_keeps_partial_results() {
        let cancel_seen = CancellationToken::new();
        let forum = MockForum::new(CHANNEL)
            .with_archived((1..=300).rev().map(MockForum::thread))
            .with_fetch_delay(Duration::from_millis(10));
        let (_, service) = service(forum);

        let session = service.open_session();
        let token = session.token().clone();
        let id = session.id();
        let canceller = {
            let token = token.clone();
            let seen = cancel_seen.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                token.cancel();
                seen.cancel();
            })
        };

        let outcome = service
            .search(session, USER, CHANNEL, &SearchRequest::default(), &NoProgress)
            .await;
        canceller.await.unwrap();

        let SearchOutcome::Cancelled { pages, summary } = &outcome else {
            panic!("expected cancellation, got {outcome:?}");
        };
        assert!(cancel_seen.is_cancelled());
        assert!(pages.total_items() < 300);
        assert_eq!(summary.termination, Termination::Cancelled);
        assert!(!service.sessions().is_active(id));
        assert!(service.history().recent(USER).is_empty());
    }

    #[tokio::test]
    async fn finished_searches_are_remembered() {
        let (_, service) = service(
            MockForum::new(CHANNEL).with_active([MockForum::thread(1).with_tags(&["bug"])]),
        );
        let request = SearchRequest {
            tags: vec!["BUG".to_string()],
            ..Default::default()
        };

        service
            .search(service.open_session(), USER, CHANNEL, &request, &NoProgress)
            .await;

        let history = service.history().recent(USER);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].results, 1);
        assert_eq!(history[0].required_tags, vec!["bug".to_string()]);
        assert_eq!(history[0].channel, CHANNEL);
    }
}
