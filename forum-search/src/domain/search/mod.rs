//! Forum thread search.
//!
//! A search runs in layers: [`SearchRequest`] is validated into
//! [`SearchConditions`], the [`SearchOrchestrator`] walks the active and
//! archived threads of a forum, the [`ThreadScanner`] filters each thread
//! under a shared concurrency limit, and [`ForumSearch`] sorts, pages and
//! remembers the outcome.
//!
//! ```
//! use forum_search::domain::search::{evaluate, parse_query};
//!
//! let query = parse_query("\"stack trace\" | panic");
//! assert!(evaluate(&query, "Stack trace attached below"));
//! assert!(!evaluate(&query, "works on my machine"));
//! ```

mod conditions;
mod history;
#[cfg(test)]
pub(crate) mod mock;
mod orchestrator;
mod pagination;
mod parser;
mod scanner;
mod service;
mod session;
mod sort;
mod tags;

pub use conditions::{parse_date, ConditionsError, SearchConditions, SearchQuery, SearchRequest};
pub use history::{HistoryEntry, SearchHistory};
pub use orchestrator::{OrchestratorConfig, ScanReport, SearchOrchestrator, Termination};
pub use pagination::Pages;
pub use parser::{evaluate, parse_query, QueryNode, SYNTAX_HELP};
pub use scanner::{Rejection, RetryPolicy, ScannerConfig, ThreadScanner, Verdict};
pub use service::{ForumSearch, SearchOutcome, SearchSummary, ServiceConfig};
pub use session::{SearchSessions, SessionGuard};
pub use sort::SortOrder;
pub use tags::{tags_match, TagMatcher};
