//! Port for per-file line search backends
use crate::context::SearchContext;
use crate::error::ProviderError;
use std::path::Path;

/// Matches reported for a single file are capped at this many lines.
pub const MAX_MATCHES_PER_FILE: usize = 20;

/// One matching line as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    /// 1-based line number.
    pub line_number: usize,
    /// Full text of the matching line, without its line terminator.
    pub text: String,
    /// Byte span of the first match within `text`, if the backend reported one.
    pub span: Option<(usize, usize)>,
}

impl RawMatch {
    /// Clamps the span into the line so that `start <= end <= text.len()`.
    pub fn new(line_number: usize, text: String, span: Option<(usize, usize)>) -> Self {
        let span = span.map(|(start, end)| {
            let end = end.min(text.len());
            (start.min(end), end)
        });
        Self {
            line_number,
            text,
            span,
        }
    }
}

/// Searches one file for a query.
///
/// Implementations match case-insensitively, return at most
/// [`MAX_MATCHES_PER_FILE`] records in file order and treat "no matches" as
/// an empty `Ok`. A backend that cannot run at all reports
/// [`ProviderError::Unavailable`].
#[cfg_attr(test, mockall::automock)]
pub trait LineSearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the backend can run at all. Checked once per search call
    /// before any work is fanned out.
    fn availability(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn search(
        &self,
        ctx: &SearchContext,
        query: &str,
        path: &Path,
    ) -> Result<Vec<RawMatch>, ProviderError>;
}
