//! Cancellation and deadline handle shared by every stage of a search call
use crate::error::SearchError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cloneable handle carrying a cancel flag and an optional deadline.
///
/// Clones share the flag, so a UI thread can keep one clone and cancel a
/// search that another thread is running.
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl SearchContext {
    /// A context that is never done unless cancelled explicitly.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// The reason this context is done, if it is. An explicit cancel takes
    /// precedence over an expired deadline.
    pub fn err(&self) -> Option<SearchError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Some(SearchError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(SearchError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
