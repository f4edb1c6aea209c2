//! Session search: metadata filtering, content fan-out and result types
pub mod content;
pub mod engine;
pub mod filter;
pub mod provider;
pub mod regex_scan;
pub mod ripgrep;
pub mod snippet;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use content::ContentSearchEngine;
pub use engine::SearchCoordinator;
pub use filter::FilterEngine;
pub use provider::{LineSearchProvider, RawMatch};
pub use regex_scan::RegexLineSearch;
pub use ripgrep::RipgrepProvider;
pub use snippet::extract_context;

/// How long an ordinary status message stays on screen.
pub const STATUS_DISPLAY_DURATION: Duration = Duration::from_secs(3);
/// Advisories point at an environment problem, so they stay up longer.
pub const ADVISORY_DISPLAY_DURATION: Duration = Duration::from_secs(10);

/// Which engine services a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchKind {
    #[default]
    Filter,
    Content,
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchKind::Filter => write!(f, "filter"),
            SearchKind::Content => write!(f, "content"),
        }
    }
}

impl FromStr for SearchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "filter" => Ok(SearchKind::Filter),
            "content" => Ok(SearchKind::Content),
            other => Err(format!("unknown search kind: {other}")),
        }
    }
}

/// One located occurrence of a query.
///
/// For content matches `text` is the raw matched line and
/// `text[start_offset..end_offset]` is the first match span in it. Filter
/// matches leave `text` empty and record a single highlighted character
/// position as `start_offset..start_offset + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    pub text: String,
    pub line_number: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub context: String,
}

impl Match {
    pub fn matched_text(&self) -> Option<&str> {
        self.text.get(self.start_offset..self.end_offset)
    }
}

/// All matches for one session plus its ranking score.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub session_id: String,
    /// Position of the session in the collection searched by this call.
    pub session_index: usize,
    pub matches: Vec<Match>,
    pub score: f64,
}

impl SearchResult {
    /// Character positions recorded by a filter match, for highlighting.
    pub fn highlight_positions(&self) -> Vec<usize> {
        self.matches.iter().map(|m| m.start_offset).collect()
    }
}

/// Advisory the caller should surface once, with a longer display time
/// than ordinary status messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    ToolUnavailable { tool: String },
    Cancelled,
    DeadlineExceeded,
}

impl Advisory {
    pub fn message(&self) -> String {
        match self {
            Advisory::ToolUnavailable { tool } => format!(
                "Content search unavailable: '{tool}' was not found. Install ripgrep to search transcripts."
            ),
            Advisory::Cancelled => "Search cancelled".to_string(),
            Advisory::DeadlineExceeded => {
                "Search timed out before all sessions were scanned".to_string()
            }
        }
    }

    pub fn display_duration(&self) -> Duration {
        ADVISORY_DISPLAY_DURATION
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Successful response of one search call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub advisory: Option<Advisory>,
}

impl SearchOutcome {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            advisory: None,
        }
    }

    /// Content results arrive in completion order; this restores the order
    /// of the session collection.
    pub fn sort_by_session_index(&mut self) {
        self.results.sort_by_key(|r| r.session_index);
    }

    pub fn total_matches(&self) -> usize {
        self.results.iter().map(|r| r.matches.len()).sum()
    }
}
