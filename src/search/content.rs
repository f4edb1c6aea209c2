//! Deep search across the full transcript of every session
//!
//! One job per session is queued on a bounded channel and consumed by a
//! fixed pool of scoped worker threads. Each worker runs the line-search
//! provider for its file, turns raw matches into [`Match`]es with snippets,
//! and sends a result only when the file matched.
use crate::config::ContentConfig;
use crate::context::SearchContext;
use crate::error::{ProviderError, Result as SessiongrepResult, SearchError};
use crate::metrics::SearchMetrics;
use crate::search::provider::{LineSearchProvider, RawMatch};
use crate::search::ripgrep::RipgrepProvider;
use crate::search::snippet::extract_context;
use crate::search::{Advisory, Match, SearchOutcome, SearchResult};
use crate::session::SessionRecord;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

pub const DEFAULT_WORKERS: usize = 4;

struct SearchJob<'a> {
    query: &'a str,
    session: &'a SessionRecord,
    session_index: usize,
}

/// Fans a query out over session files with a bounded worker pool.
pub struct ContentSearchEngine {
    provider: Box<dyn LineSearchProvider>,
    workers: usize,
    metrics: Arc<SearchMetrics>,
    unavailable_reported: AtomicBool,
}

impl ContentSearchEngine {
    /// Engine backed by ripgrep, resolved once from the configured candidates.
    pub fn new(config: &ContentConfig) -> Self {
        Self::with_provider(Box::new(RipgrepProvider::new(config)), config.workers)
    }

    pub fn with_provider(provider: Box<dyn LineSearchProvider>, workers: usize) -> Self {
        Self {
            provider,
            workers: workers.max(1),
            metrics: Arc::new(SearchMetrics::new()),
            unavailable_reported: AtomicBool::new(false),
        }
    }

    pub fn metrics(&self) -> Arc<SearchMetrics> {
        self.metrics.clone()
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Searches every session file for `query`.
    ///
    /// Only sessions with at least one match are returned, in completion
    /// order. If `ctx` is done before every job was queued and started, the
    /// whole call fails with the cancellation error and no results. A
    /// deadline passing after the last job finished does not discard them.
    pub fn search_content(
        &self,
        ctx: &SearchContext,
        query: &str,
        sessions: &[SessionRecord],
    ) -> SessiongrepResult<SearchOutcome> {
        if let Some(err) = ctx.err() {
            self.metrics.searches_cancelled.inc();
            return Err(err);
        }
        if sessions.is_empty() {
            return Ok(SearchOutcome::default());
        }
        if let Err(e) = self.provider.availability() {
            debug!("Content search skipped: {e}");
            return Ok(self.unavailable_outcome(&e, Vec::new()));
        }

        let missing_tool: Mutex<Option<String>> = Mutex::new(None);
        let stopped_early = AtomicBool::new(false);
        let (job_tx, job_rx) = bounded::<SearchJob<'_>>(sessions.len());
        let (result_tx, result_rx) = bounded::<SearchResult>(sessions.len());

        let results = thread::scope(|scope| {
            for _ in 0..self.workers.min(sessions.len()) {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                let missing_tool = &missing_tool;
                let stopped_early = &stopped_early;
                scope.spawn(move || {
                    if !self.run_worker(ctx, jobs, results, missing_tool) {
                        stopped_early.store(true, Ordering::SeqCst);
                    }
                });
            }
            drop(result_tx);

            for (session_index, session) in sessions.iter().enumerate() {
                if let Some(err) = ctx.err() {
                    debug!("Cancelled while queueing job {session_index} of {}", sessions.len());
                    return Err(err);
                }
                let job = SearchJob {
                    query,
                    session,
                    session_index,
                };
                if job_tx.send(job).is_err() {
                    break;
                }
            }
            drop(job_tx);

            Ok(result_rx
                .iter()
                .filter(|result| !result.matches.is_empty())
                .collect::<Vec<_>>())
        });

        let results = results.and_then(|results| {
            if stopped_early.load(Ordering::SeqCst) {
                Err(ctx.err().unwrap_or(SearchError::Cancelled))
            } else {
                Ok(results)
            }
        });
        let results = match results {
            Ok(results) => results,
            Err(err) => {
                self.metrics.searches_cancelled.inc();
                return Err(err);
            }
        };

        if let Some(tool) = missing_tool.into_inner() {
            let missing = ProviderError::Unavailable { tool };
            return Ok(self.unavailable_outcome(&missing, results));
        }
        Ok(SearchOutcome::new(results))
    }

    /// Returns `false` when the worker stopped before the queue was drained.
    fn run_worker(
        &self,
        ctx: &SearchContext,
        jobs: Receiver<SearchJob<'_>>,
        results: Sender<SearchResult>,
        missing_tool: &Mutex<Option<String>>,
    ) -> bool {
        for job in jobs.iter() {
            if ctx.is_done() {
                return false;
            }
            self.metrics.files_searched.inc();

            let path = &job.session.file_path;
            let raw = match self.provider.search(ctx, job.query, path) {
                Ok(raw) => raw,
                Err(ProviderError::Cancelled) => return false,
                Err(ProviderError::Unavailable { tool }) => {
                    debug!("Search tool '{tool}' vanished while searching {}", path.display());
                    *missing_tool.lock() = Some(tool);
                    continue;
                }
                Err(e) if e.is_missing_file() => {
                    debug!("Session file {} is gone, skipping", path.display());
                    self.metrics.provider_failures.inc();
                    continue;
                }
                Err(e) => {
                    warn!("Failed to search {}: {e}", path.display());
                    self.metrics.provider_failures.inc();
                    continue;
                }
            };
            if raw.is_empty() {
                continue;
            }

            self.metrics.files_matched.inc();
            let matches: Vec<Match> = raw.into_iter().map(to_match).collect();
            let result = SearchResult {
                session_id: job.session.id.clone(),
                session_index: job.session_index,
                score: matches.len() as f64,
                matches,
            };
            if results.send(result).is_err() {
                return false;
            }
        }
        true
    }

    /// Attaches the tool-unavailable advisory the first time only.
    fn unavailable_outcome(&self, err: &ProviderError, results: Vec<SearchResult>) -> SearchOutcome {
        let first = !self.unavailable_reported.swap(true, Ordering::SeqCst);
        let advisory = match err {
            ProviderError::Unavailable { tool } if first => {
                warn!("Content search unavailable: {err}");
                Some(Advisory::ToolUnavailable { tool: tool.clone() })
            }
            _ => None,
        };
        SearchOutcome { results, advisory }
    }
}

fn to_match(raw: RawMatch) -> Match {
    let (start_offset, end_offset, context) = match raw.span {
        Some((start, end)) => (start, end, extract_context(&raw.text, start, end)),
        None => (0, 0, String::new()),
    };
    Match {
        text: raw.text,
        line_number: raw.line_number,
        start_offset,
        end_offset,
        context,
    }
}
