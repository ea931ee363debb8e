//! Two-phase scan of a forum channel.
//!
//! Active threads are scanned as one batch, then archived threads are paged
//! newest-first until the list is exhausted, the result cap is reached, the
//! search is cancelled or the archive keeps failing.

use std::{sync::Arc, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{conditions::SearchConditions, scanner::ThreadScanner};
use crate::domain::{
    models::{ChannelId, SearchResult, Thread},
    ports::outbound::{MessageSource, ProgressSink, ProgressStage, SearchProgress, ThreadSource},
    Result, SearchError, SourceError,
};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Hard cap on results per search, active and archived combined
    pub max_results: usize,
    pub archived_batch_size: usize,
    /// Minimum gap between progress updates while paging the archive
    pub progress_interval: Duration,
    /// Consecutive archive page failures before giving up
    pub archive_retry_limit: u32,
    pub archive_retry_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_results: 1000,
            archived_batch_size: 100,
            progress_interval: Duration::from_millis(1500),
            archive_retry_limit: 3,
            archive_retry_backoff: Duration::from_secs(2),
        }
    }
}

/// Why a scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Completed,
    CapReached,
    Cancelled,
    /// The archive could not be paged; results are partial
    ArchiveErrors,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Unsorted matches
    pub results: Vec<SearchResult>,
    pub processed: usize,
    pub archived_batches: usize,
    pub termination: Termination,
    pub elapsed: Duration,
}

/// Throttled progress updates. Sink errors are logged and swallowed.
struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    interval: Duration,
    started: Instant,
    last: Option<Instant>,
}

impl<'a> ProgressReporter<'a> {
    fn new(sink: &'a dyn ProgressSink, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            started: Instant::now(),
            last: None,
        }
    }

    async fn report(&mut self, stage: ProgressStage, counts: Counts, force: bool) {
        let now = Instant::now();
        if !force && self.last.is_some_and(|last| now - last < self.interval) {
            return;
        }
        self.last = Some(now);

        let progress = SearchProgress {
            stage,
            processed: counts.processed,
            matched: counts.matched,
            archived_batches: counts.batches,
            elapsed: now - self.started,
        };
        if let Err(e) = self.sink.render(&progress).await {
            warn!(error = %e, "Progress update failed");
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    processed: usize,
    matched: usize,
    batches: usize,
}

/// Drives a [`ThreadScanner`] over a whole channel.
pub struct SearchOrchestrator<T, M> {
    threads: Arc<T>,
    scanner: ThreadScanner<M>,
    config: OrchestratorConfig,
}

impl<T, M> SearchOrchestrator<T, M>
where
    T: ThreadSource,
    M: MessageSource,
{
    pub fn new(threads: Arc<T>, scanner: ThreadScanner<M>, config: OrchestratorConfig) -> Self {
        Self {
            threads,
            scanner,
            config,
        }
    }

    pub fn scanner(&self) -> &ThreadScanner<M> {
        &self.scanner
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Scan `channel` for threads matching `conditions`.
    ///
    /// Only a missing channel is an error; cancellation, the cap and archive
    /// failures all end the scan with the results gathered so far.
    pub async fn run(
        &self,
        channel: ChannelId,
        conditions: Arc<SearchConditions>,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<ScanReport> {
        let mut reporter = ProgressReporter::new(progress, self.config.progress_interval);
        let mut counts = Counts::default();
        reporter
            .report(ProgressStage::ScanningActive, counts, true)
            .await;

        let active = match self.threads.list_active_threads(channel).await {
            Ok(threads) => threads,
            Err(SourceError::ChannelNotFound(channel)) => {
                return Err(SearchError::ChannelNotFound(channel))
            }
            Err(e) => {
                warn!(%channel, error = %e, "Failed to list active threads, continuing with archive");
                Vec::new()
            }
        };

        let mut results = self.scanner.scan_batch(&active, &conditions, cancel).await;
        counts.processed = active.len();
        counts.matched = results.len();
        info!(
            %channel,
            active = active.len(),
            matched = results.len(),
            "Scanned active threads"
        );

        let termination = if cancel.is_cancelled() {
            Termination::Cancelled
        } else if results.len() >= self.config.max_results {
            results.truncate(self.config.max_results);
            counts.matched = results.len();
            Termination::CapReached
        } else {
            reporter
                .report(ProgressStage::ScanningArchived, counts, true)
                .await;
            let remaining = self.config.max_results - results.len();
            let (archived, termination) = self
                .scan_archive(channel, &conditions, cancel, remaining, &mut counts, &mut reporter)
                .await;
            results.extend(archived);
            termination
        };

        counts.matched = results.len();
        let final_stage = match termination {
            Termination::Cancelled => ProgressStage::Cancelled,
            Termination::CapReached => ProgressStage::CapReached {
                cap: self.config.max_results,
            },
            Termination::Completed | Termination::ArchiveErrors => ProgressStage::Finished,
        };
        reporter.report(final_stage, counts, true).await;

        let elapsed = reporter.started.elapsed();
        info!(
            %channel,
            processed = counts.processed,
            matched = results.len(),
            batches = counts.batches,
            ?termination,
            elapsed_ms = elapsed.as_millis() as u64,
            "Search scan finished"
        );

        Ok(ScanReport {
            results,
            processed: counts.processed,
            archived_batches: counts.batches,
            termination,
            elapsed,
        })
    }

    async fn scan_archive(
        &self,
        channel: ChannelId,
        conditions: &Arc<SearchConditions>,
        cancel: &CancellationToken,
        cap: usize,
        counts: &mut Counts,
        reporter: &mut ProgressReporter<'_>,
    ) -> (Vec<SearchResult>, Termination) {
        let base_matched = counts.matched;
        let mut results = Vec::new();
        let mut cursor: Option<Thread> = None;
        let mut consecutive_errors = 0;

        let termination = loop {
            if cancel.is_cancelled() {
                break Termination::Cancelled;
            }
            if results.len() >= cap {
                break Termination::CapReached;
            }

            let page = tokio::select! {
                _ = cancel.cancelled() => break Termination::Cancelled,
                page = self.threads.list_archived_threads(
                    channel,
                    self.config.archived_batch_size,
                    cursor.as_ref(),
                ) => page,
            };

            let page = match page {
                Ok(page) => {
                    consecutive_errors = 0;
                    page
                }
                Err(SourceError::ChannelNotFound(_)) => break Termination::ArchiveErrors,
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(
                        %channel,
                        batch = counts.batches + 1,
                        attempt = consecutive_errors,
                        error = %e,
                        "Failed to fetch archived threads"
                    );
                    reporter
                        .report(
                            ProgressStage::BatchFailed {
                                batch: counts.batches + 1,
                            },
                            *counts,
                            false,
                        )
                        .await;

                    if consecutive_errors >= self.config.archive_retry_limit {
                        break Termination::ArchiveErrors;
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break Termination::Cancelled,
                        _ = tokio::time::sleep(self.config.archive_retry_backoff) => continue,
                    }
                }
            };

            let Some(last) = page.last() else {
                break Termination::Completed;
            };
            cursor = Some(last.clone());
            counts.batches += 1;

            let matched = self.scanner.scan_batch(&page, conditions, cancel).await;
            counts.processed += page.len();
            results.extend(matched);
            counts.matched = base_matched + results.len().min(cap);

            if results.len() >= cap {
                results.truncate(cap);
                break Termination::CapReached;
            }

            reporter
                .report(ProgressStage::ScanningArchived, *counts, false)
                .await;
        };

        (results, termination)
    }
}
