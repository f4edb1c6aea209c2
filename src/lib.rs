//! Ranked free-text search over session transcript logs.
//!
//! Two strategies share one entry point, [`SearchCoordinator`]: a fuzzy
//! filter over session metadata that never touches the disk, and a content
//! search that runs a line-search tool over every transcript file on a
//! bounded worker pool.
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod search;
pub mod session;

pub use crate::config::Config;
pub use crate::context::SearchContext;
pub use crate::error::{ProviderError, Result, SearchError};
pub use crate::metrics::SearchMetrics;
pub use crate::search::{
    Advisory, ContentSearchEngine, FilterEngine, LineSearchProvider, Match, RawMatch,
    RegexLineSearch, RipgrepProvider, SearchCoordinator, SearchKind, SearchOutcome, SearchResult,
};
pub use crate::session::SessionRecord;
