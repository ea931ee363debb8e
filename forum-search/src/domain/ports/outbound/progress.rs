use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ProgressError;

/// Where a running search currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    ScanningActive,
    ScanningArchived,
    /// An archived batch could not be fetched; the scan will retry.
    BatchFailed { batch: usize },
    CapReached { cap: usize },
    Cancelled,
    Finished,
}

/// Snapshot handed to the progress sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchProgress {
    pub stage: ProgressStage,
    pub processed: usize,
    pub matched: usize,
    pub archived_batches: usize,
    pub elapsed: Duration,
}

impl SearchProgress {
    /// Short human-readable status line.
    pub fn status_text(&self) -> String {
        let secs = self.elapsed.as_secs_f64();
        match self.stage {
            ProgressStage::ScanningActive => format!(
                "Scanning active threads... processed {}, matched {} ({secs:.1}s)",
                self.processed, self.matched
            ),
            ProgressStage::ScanningArchived => format!(
                "Scanning archived threads... processed {}, matched {}, {} batches ({secs:.1}s)",
                self.processed, self.matched, self.archived_batches
            ),
            ProgressStage::BatchFailed { batch } => format!(
                "Batch {batch} failed, retrying... processed {}, matched {}",
                self.processed, self.matched
            ),
            ProgressStage::CapReached { cap } => format!(
                "Result cap ({cap}) reached after {} threads ({secs:.1}s)",
                self.processed
            ),
            ProgressStage::Cancelled => format!(
                "Search cancelled: processed {}, matched {} ({secs:.1}s)",
                self.processed, self.matched
            ),
            ProgressStage::Finished => format!(
                "Search finished: processed {}, matched {} ({secs:.1}s)",
                self.processed, self.matched
            ),
        }
    }
}

/// Outbound port for the live progress display.
///
/// Rendering must be idempotent; errors are logged and never abort the scan.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn render(&self, progress: &SearchProgress) -> Result<(), ProgressError>;
}

/// Progress sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn render(&self, _progress: &SearchProgress) -> Result<(), ProgressError> {
        Ok(())
    }
}
