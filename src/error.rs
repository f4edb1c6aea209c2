use crate::search::Advisory;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search cancelled")]
    Cancelled,

    #[error("search deadline exceeded")]
    DeadlineExceeded,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl SearchError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SearchError::Cancelled | SearchError::DeadlineExceeded)
    }

    /// Errors the caller should show as a long-lived advisory instead of a
    /// one-off status line.
    pub fn advisory(&self) -> Option<Advisory> {
        match self {
            SearchError::Cancelled => Some(Advisory::Cancelled),
            SearchError::DeadlineExceeded => Some(Advisory::DeadlineExceeded),
            _ => None,
        }
    }
}

/// Failure of a single line-search invocation. Always scoped to one file.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("search tool '{tool}' is not installed")]
    Unavailable { tool: String },

    #[error("failed to start '{tool}': {source}")]
    Spawn {
        tool: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("search tool exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("search cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn is_missing_file(&self) -> bool {
        matches!(self, ProviderError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
