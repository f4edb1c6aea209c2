//! Fuzzy filtering over session metadata
use crate::config::FilterConfig;
use crate::search::{Match, SearchResult};
use crate::session::SessionRecord;
use chrono::format::{Item, StrftimeItems};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use log::warn;
use std::collections::HashSet;

/// Score given to every session when the query is empty.
pub const PASS_THROUGH_SCORE: f64 = 1.0;
const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// In-memory subsequence matcher over `"<id> <last active>"` strings.
/// Never touches the disk.
pub struct FilterEngine {
    matcher: SkimMatcherV2,
    timestamp_format: String,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

impl FilterEngine {
    pub fn new(config: &FilterConfig) -> Self {
        let timestamp_format = if is_valid_format(&config.timestamp_format) {
            config.timestamp_format.clone()
        } else {
            warn!(
                "Invalid timestamp format '{}', using '{DEFAULT_TIMESTAMP_FORMAT}'",
                config.timestamp_format
            );
            DEFAULT_TIMESTAMP_FORMAT.to_string()
        };

        Self {
            matcher: SkimMatcherV2::default().ignore_case(),
            timestamp_format,
        }
    }

    pub fn searchable_text(&self, session: &SessionRecord) -> String {
        format!(
            "{} {}",
            session.id,
            session.last_active.format(&self.timestamp_format)
        )
    }

    /// Results are ordered by score, best first, ties by position in
    /// `sessions`. An empty query returns every session unranked.
    pub fn filter(&self, query: &str, sessions: &[SessionRecord]) -> Vec<SearchResult> {
        if query.is_empty() {
            return sessions
                .iter()
                .enumerate()
                .map(|(index, session)| SearchResult {
                    session_id: session.id.clone(),
                    session_index: index,
                    matches: Vec::new(),
                    score: PASS_THROUGH_SCORE,
                })
                .collect();
        }

        let mut results: Vec<SearchResult> = sessions
            .iter()
            .enumerate()
            .filter_map(|(index, session)| {
                let text = self.searchable_text(session);
                let (score, positions) = self.matcher.fuzzy_indices(&text, query)?;
                Some(SearchResult {
                    session_id: session.id.clone(),
                    session_index: index,
                    matches: positions.into_iter().map(highlight_match).collect(),
                    score: score as f64,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.session_index.cmp(&b.session_index))
        });
        results
    }
}

fn highlight_match(position: usize) -> Match {
    Match {
        start_offset: position,
        end_offset: position + 1,
        ..Match::default()
    }
}

fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Applies `style` to every character of `text` whose position is listed.
/// Positions count characters, not bytes; out-of-range ones are ignored.
pub fn highlight_text<F>(text: &str, positions: &[usize], style: F) -> String
where
    F: Fn(&str) -> String,
{
    if positions.is_empty() {
        return text.to_string();
    }

    let marked: HashSet<usize> = positions.iter().copied().collect();
    let mut highlighted = String::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for (i, ch) in text.chars().enumerate() {
        if marked.contains(&i) {
            highlighted.push_str(&style(ch.encode_utf8(&mut buf)));
        } else {
            highlighted.push(ch);
        }
    }
    highlighted
}
