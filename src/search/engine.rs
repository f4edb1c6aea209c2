//! Single entry point dispatching queries to the filter or content engine
use crate::config::Config;
use crate::context::SearchContext;
use crate::error::Result;
use crate::metrics::SearchMetrics;
use crate::search::{ContentSearchEngine, FilterEngine, SearchKind, SearchOutcome};
use crate::session::SessionRecord;
use log::debug;
use std::sync::Arc;

/// Holds the current session set and routes each query by [`SearchKind`].
pub struct SearchCoordinator {
    sessions: Arc<[SessionRecord]>,
    filter: FilterEngine,
    content: ContentSearchEngine,
}

impl SearchCoordinator {
    pub fn new(sessions: impl Into<Arc<[SessionRecord]>>, config: &Config) -> Self {
        Self::with_engines(
            sessions,
            FilterEngine::new(&config.filter),
            ContentSearchEngine::new(&config.content),
        )
    }

    /// Coordinator configured from the user's config file, or defaults when
    /// there is none.
    pub fn from_user_config(sessions: impl Into<Arc<[SessionRecord]>>) -> Result<Self> {
        let config = Config::load()?;
        Ok(Self::new(sessions, &config))
    }

    pub fn with_engines(
        sessions: impl Into<Arc<[SessionRecord]>>,
        filter: FilterEngine,
        content: ContentSearchEngine,
    ) -> Self {
        Self {
            sessions: sessions.into(),
            filter,
            content,
        }
    }

    /// Runs `query` against the held sessions.
    ///
    /// Filter queries complete synchronously and never fail. Content queries
    /// fail only when `ctx` is cancelled or past its deadline.
    pub fn search(
        &self,
        ctx: &SearchContext,
        query: &str,
        kind: SearchKind,
    ) -> Result<SearchOutcome> {
        debug!(
            "{kind} search for {query:?} over {} sessions",
            self.sessions.len()
        );
        match kind {
            SearchKind::Filter => Ok(SearchOutcome::new(self.filter.filter(query, &self.sessions))),
            SearchKind::Content => self.content.search_content(ctx, query, &self.sessions),
        }
    }

    /// Like [`search`](Self::search) with the kind given by name. An
    /// unrecognised name yields an empty outcome rather than an error.
    pub fn search_named(
        &self,
        ctx: &SearchContext,
        query: &str,
        kind: &str,
    ) -> Result<SearchOutcome> {
        match kind.parse::<SearchKind>() {
            Ok(kind) => self.search(ctx, query, kind),
            Err(e) => {
                debug!("{e}");
                Ok(SearchOutcome::default())
            }
        }
    }

    /// Replaces the session set seen by later searches.
    pub fn update_sessions(&mut self, sessions: impl Into<Arc<[SessionRecord]>>) {
        self.sessions = sessions.into();
        debug!("Session set replaced, {} sessions", self.sessions.len());
    }

    pub fn sessions(&self) -> &Arc<[SessionRecord]> {
        &self.sessions
    }

    pub fn content_metrics(&self) -> Arc<SearchMetrics> {
        self.content.metrics()
    }
}
