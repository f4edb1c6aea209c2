use crate::error::Result;
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SESSION_EXTENSION: &str = "jsonl";

/// Identity and metadata of one transcript log, as supplied by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    pub file_path: PathBuf,
    pub last_active: DateTime<Local>,
}

impl SessionRecord {
    pub fn new(
        id: impl Into<String>,
        file_path: impl Into<PathBuf>,
        last_active: DateTime<Local>,
    ) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
            last_active,
        }
    }

    /// Builds a record from a transcript file on disk, using its file stem as
    /// the session ID and its modification time as the last-active time.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let modified = fs::metadata(path)?.modified()?;
        Ok(Self {
            id: session_id_from_path(path),
            file_path: path.to_path_buf(),
            last_active: DateTime::<Local>::from(modified),
        })
    }
}

/// Session ID for a transcript file: its file name without the `.jsonl`
/// extension.
pub fn session_id_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.strip_suffix(&format!(".{SESSION_EXTENSION}")) {
        Some(stem) => stem.to_string(),
        None => file_name,
    }
}

/// Records for the given transcript files, most recently active first.
pub fn load_sessions<I, P>(paths: I) -> Result<Vec<SessionRecord>>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut sessions = paths
        .into_iter()
        .map(|path| SessionRecord::from_path(path.as_ref()))
        .collect::<io::Result<Vec<_>>>()?;
    sessions.sort_by(|a, b| b.last_active.cmp(&a.last_active));
    Ok(sessions)
}
