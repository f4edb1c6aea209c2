//! In-process line search, no external tool required
use crate::context::SearchContext;
use crate::error::ProviderError;
use crate::search::provider::{LineSearchProvider, RawMatch, MAX_MATCHES_PER_FILE};
use lru::LruCache;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::num::NonZeroUsize;
use std::path::Path;

const PATTERN_CACHE_SIZE: usize = 16;
/// How many lines are scanned between two cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Scans files line by line with a case-insensitive regex.
///
/// Follows the same contract as the ripgrep provider, which makes it a
/// drop-in replacement on machines without ripgrep.
pub struct RegexLineSearch {
    max_matches: usize,
    patterns: Mutex<LruCache<String, Regex>>,
}

impl Default for RegexLineSearch {
    fn default() -> Self {
        Self::new(MAX_MATCHES_PER_FILE)
    }
}

impl RegexLineSearch {
    pub fn new(max_matches: usize) -> Self {
        let capacity = NonZeroUsize::new(PATTERN_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            max_matches,
            patterns: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn compile(&self, query: &str) -> Result<Regex, ProviderError> {
        let mut patterns = self.patterns.lock();
        if let Some(regex) = patterns.get(query) {
            return Ok(regex.clone());
        }
        let regex = RegexBuilder::new(query).case_insensitive(true).build()?;
        patterns.put(query.to_string(), regex.clone());
        Ok(regex)
    }
}

impl LineSearchProvider for RegexLineSearch {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn search(
        &self,
        ctx: &SearchContext,
        query: &str,
        path: &Path,
    ) -> Result<Vec<RawMatch>, ProviderError> {
        let regex = self.compile(query)?;
        let mut reader = BufReader::new(File::open(path)?);
        let mut matches = Vec::new();
        let mut buffer = Vec::new();
        let mut line_number = 0;

        while matches.len() < self.max_matches {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }
            line_number += 1;
            if line_number % CANCEL_CHECK_INTERVAL == 0 && ctx.is_done() {
                return Err(ProviderError::Cancelled);
            }

            let line = String::from_utf8_lossy(&buffer);
            let line = line.trim_end_matches(&['\n', '\r'][..]);
            if let Some(m) = regex.find(line) {
                matches.push(RawMatch::new(
                    line_number,
                    line.to_string(),
                    Some((m.start(), m.end())),
                ));
            }
        }

        Ok(matches)
    }
}
