//! ripgrep-backed line search
//!
//! Each call spawns one `rg --json` process for a single file and decodes the
//! newline-delimited records it prints. The child is polled while it runs and
//! killed as soon as the search context is done, so a timed-out search never
//! leaves processes behind.
use crate::config::ContentConfig;
use crate::context::SearchContext;
use crate::error::ProviderError;
use crate::search::provider::{LineSearchProvider, RawMatch, MAX_MATCHES_PER_FILE};
use log::{debug, info, trace, warn};
use serde::Deserialize;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(5);
/// ripgrep exits with 1 when it ran fine but found nothing.
const EXIT_NO_MATCHES: i32 = 1;

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MatchData {
    line_number: Option<usize>,
    lines: LineData,
    #[serde(default)]
    submatches: Vec<SubMatch>,
}

/// ripgrep reports valid UTF-8 as `text` and anything else as base64 `bytes`.
#[derive(Debug, Deserialize)]
struct LineData {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubMatch {
    start: usize,
    end: usize,
}

/// Resolves the first usable candidate. Bare names are looked up on `PATH`,
/// paths are checked as given.
pub fn resolve_tool(candidates: &[String]) -> Option<PathBuf> {
    candidates.iter().find_map(|candidate| match which::which(candidate) {
        Ok(path) => Some(path),
        Err(e) => {
            trace!("Search tool candidate '{candidate}' rejected: {e}");
            None
        }
    })
}

/// Decodes ripgrep's JSON output. Only `match` records carry data; every
/// other record kind is ignored and undecodable lines are skipped.
pub fn parse_json_stream(output: &[u8], max_matches: usize) -> Vec<RawMatch> {
    output
        .split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .filter_map(parse_match_record)
        .take(max_matches)
        .collect()
}

fn parse_match_record(line: &[u8]) -> Option<RawMatch> {
    let record: Record = match serde_json::from_slice(line) {
        Ok(record) => record,
        Err(e) => {
            trace!("Skipping malformed search record: {e}");
            return None;
        }
    };
    if record.kind != "match" {
        return None;
    }

    let data: MatchData = match serde_json::from_value(record.data) {
        Ok(data) => data,
        Err(e) => {
            trace!("Skipping match record with unexpected payload: {e}");
            return None;
        }
    };
    let line_number = data.line_number.filter(|&n| n > 0)?;
    let text = trim_line_terminator(data.lines.text?);
    let span = data.submatches.first().map(|sub| (sub.start, sub.end));

    Some(RawMatch::new(line_number, text, span))
}

fn trim_line_terminator(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

fn drain(stream: Option<impl Read>) -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buffer) {
            debug!("Failed to read search tool output: {e}");
        }
    }
    buffer
}

fn wait_or_kill(ctx: &SearchContext, child: &mut Child) -> Result<ExitStatus, ProviderError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => {
                kill_and_reap(child);
                return Err(ProviderError::Io(e));
            }
        }

        if ctx.is_done() {
            debug!("Killing search process {} after cancellation", child.id());
            kill_and_reap(child);
            return Err(ProviderError::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("Failed to kill search process {}: {e}", child.id());
    }
    let _ = child.wait();
}

/// [`LineSearchProvider`] that shells out to ripgrep.
///
/// The executable is resolved once, at construction, and never re-resolved.
#[derive(Debug, Clone)]
pub struct RipgrepProvider {
    tool: Option<PathBuf>,
    tool_label: String,
    max_matches: usize,
    context_lines: usize,
}

impl RipgrepProvider {
    pub fn new(config: &ContentConfig) -> Self {
        let tool = resolve_tool(&config.tool_candidates);
        let tool_label = config
            .tool_candidates
            .first()
            .cloned()
            .unwrap_or_else(|| "rg".to_string());

        match &tool {
            Some(path) => info!("Using search tool at {}", path.display()),
            None => warn!(
                "No search tool found among {:?}; content search is disabled",
                config.tool_candidates
            ),
        }

        Self {
            tool,
            tool_label,
            max_matches: config.max_matches_per_file,
            context_lines: config.context_lines,
        }
    }

    /// Uses `tool` as is, without searching for it.
    pub fn with_tool(tool: impl Into<PathBuf>) -> Self {
        let tool = tool.into();
        Self {
            tool_label: tool.display().to_string(),
            tool: Some(tool),
            max_matches: MAX_MATCHES_PER_FILE,
            context_lines: 1,
        }
    }

    pub fn tool(&self) -> Option<&Path> {
        self.tool.as_deref()
    }

    fn command_args(&self, query: &str, path: &Path) -> Vec<OsString> {
        vec![
            OsString::from("--json"),
            OsString::from("--max-count"),
            OsString::from(self.max_matches.to_string()),
            OsString::from("--context"),
            OsString::from(self.context_lines.to_string()),
            OsString::from("--ignore-case"),
            OsString::from("--regexp"),
            OsString::from(query),
            path.as_os_str().to_owned(),
        ]
    }

    fn run(
        &self,
        ctx: &SearchContext,
        tool: &Path,
        query: &str,
        path: &Path,
    ) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), ProviderError> {
        let mut child = Command::new(tool)
            .args(self.command_args(query, path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => ProviderError::Unavailable {
                    tool: tool.display().to_string(),
                },
                _ => ProviderError::Spawn {
                    tool: tool.to_path_buf(),
                    source,
                },
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Both pipes are drained concurrently so a chatty child never blocks
        // on a full pipe while we wait for it.
        thread::scope(|scope| {
            let stdout = scope.spawn(move || drain(stdout));
            let stderr = scope.spawn(move || drain(stderr));
            let status = wait_or_kill(ctx, &mut child);
            let stdout = stdout.join().unwrap_or_default();
            let stderr = stderr.join().unwrap_or_default();
            status.map(|status| (status, stdout, stderr))
        })
    }
}

impl LineSearchProvider for RipgrepProvider {
    fn name(&self) -> &'static str {
        "ripgrep"
    }

    fn availability(&self) -> Result<(), ProviderError> {
        match self.tool {
            Some(_) => Ok(()),
            None => Err(ProviderError::Unavailable {
                tool: self.tool_label.clone(),
            }),
        }
    }

    fn search(
        &self,
        ctx: &SearchContext,
        query: &str,
        path: &Path,
    ) -> Result<Vec<RawMatch>, ProviderError> {
        let tool = self.tool.as_deref().ok_or_else(|| ProviderError::Unavailable {
            tool: self.tool_label.clone(),
        })?;
        if ctx.is_done() {
            return Err(ProviderError::Cancelled);
        }

        let (status, stdout, stderr) = self.run(ctx, tool, query, path)?;
        match status.code() {
            Some(0) => Ok(parse_json_stream(&stdout, self.max_matches)),
            Some(EXIT_NO_MATCHES) => Ok(Vec::new()),
            code => Err(ProviderError::Failed {
                code,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE_OUTPUT: &str = concat!(
        r#"{"type":"begin","data":{"path":{"text":"s.jsonl"}}}"#,
        "\n",
        r#"{"type":"context","data":{"path":{"text":"s.jsonl"},"lines":{"text":"{\"type\":\"summary\"}\n"},"line_number":1,"absolute_offset":0,"submatches":[]}}"#,
        "\n",
        r#"{"type":"match","data":{"path":{"text":"s.jsonl"},"lines":{"text":"{\"content\":\"Fix the OAuth flow\"}\n"},"line_number":2,"absolute_offset":19,"submatches":[{"match":{"text":"OAuth"},"start":20,"end":25}]}}"#,
        "\n",
        "this line is not json\n",
        r#"{"type":"match","data":{"path":{"text":"s.jsonl"},"lines":{"bytes":"/w=="},"line_number":3,"absolute_offset":50,"submatches":[]}}"#,
        "\n",
        r#"{"type":"match","data":{"path":{"text":"s.jsonl"},"lines":{"text":"oauth again\r\n"},"line_number":4,"absolute_offset":60,"submatches":[{"match":{"text":"oauth"},"start":0,"end":5},{"match":{"text":"x"},"start":7,"end":8}]}}"#,
        "\n",
        r#"{"type":"end","data":{"path":{"text":"s.jsonl"},"binary_offset":null,"stats":{}}}"#,
        "\n",
        r#"{"data":{"elapsed_total":{"human":"0.01s"}},"type":"summary"}"#,
        "\n",
    );

    #[test]
    fn test_parse_keeps_only_match_records() {
        let matches = parse_json_stream(SAMPLE_OUTPUT.as_bytes(), MAX_MATCHES_PER_FILE);

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].line_number, 2);
        assert_eq!(matches[0].text, r#"{"content":"Fix the OAuth flow"}"#);
        assert_eq!(matches[0].span, Some((20, 25)));
        assert_eq!(&matches[0].text[20..25], "OAuth");
    }

    #[test]
    fn test_parse_uses_first_submatch_and_trims_crlf() {
        let matches = parse_json_stream(SAMPLE_OUTPUT.as_bytes(), MAX_MATCHES_PER_FILE);
        assert_eq!(matches[1].text, "oauth again");
        assert_eq!(matches[1].span, Some((0, 5)));
    }

    #[test]
    fn test_parse_respects_cap() {
        let matches = parse_json_stream(SAMPLE_OUTPUT.as_bytes(), 1);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_json_stream(b"", MAX_MATCHES_PER_FILE).is_empty());
    }

    #[test]
    fn test_match_without_submatches_has_no_span() {
        let line = r#"{"type":"match","data":{"lines":{"text":"plain\n"},"line_number":9,"submatches":[]}}"#;
        let matches = parse_json_stream(line.as_bytes(), MAX_MATCHES_PER_FILE);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].span, None);
        assert_eq!(matches[0].line_number, 9);
    }

    #[test]
    fn test_match_without_line_number_is_skipped() {
        let stream = concat!(
            r#"{"type":"match","data":{"lines":{"text":"no number\n"},"submatches":[]}}"#,
            "\n",
            r#"{"type":"match","data":{"lines":{"text":"zero\n"},"line_number":0,"submatches":[]}}"#,
            "\n",
            r#"{"type":"match","data":{"lines":{"text":"kept\n"},"line_number":4,"submatches":[]}}"#,
            "\n",
        );
        let matches = parse_json_stream(stream.as_bytes(), MAX_MATCHES_PER_FILE);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].line_number, 4);
        assert_eq!(matches[0].text, "kept");
    }

    #[test]
    fn test_command_args() {
        let provider = RipgrepProvider::with_tool("rg");
        let args = provider.command_args("-OAuth", Path::new("/tmp/a.jsonl"));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--json",
                "--max-count",
                "20",
                "--context",
                "1",
                "--ignore-case",
                "--regexp",
                "-OAuth",
                "/tmp/a.jsonl"
            ]
        );
    }

    #[test]
    fn test_resolve_tool_skips_missing_candidates() {
        let candidates = vec![
            "/definitely/not/here/rg".to_string(),
            "no-such-search-tool-xyz".to_string(),
        ];
        assert_eq!(resolve_tool(&candidates), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_tool_accepts_absolute_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let plain = dir.path().join("not-executable");
        fs::write(&plain, "").unwrap();
        let tool = dir.path().join("rg");
        fs::write(&tool, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let candidates = vec![
            plain.display().to_string(),
            tool.display().to_string(),
        ];
        assert_eq!(resolve_tool(&candidates), Some(tool));
    }

    #[test]
    fn test_unresolved_tool_is_unavailable() {
        let config = ContentConfig {
            tool_candidates: vec!["/definitely/not/here/rg".to_string()],
            ..ContentConfig::default()
        };
        let provider = RipgrepProvider::new(&config);

        assert!(provider.tool().is_none());
        assert!(matches!(
            provider.availability(),
            Err(ProviderError::Unavailable { ref tool }) if tool == "/definitely/not/here/rg"
        ));
        let result = provider.search(
            &SearchContext::background(),
            "x",
            Path::new("/tmp/whatever.jsonl"),
        );
        assert!(matches!(result, Err(ProviderError::Unavailable { .. })));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let provider = RipgrepProvider::with_tool("/definitely/not/here/rg");
        let result = provider.search(
            &SearchContext::background(),
            "x",
            Path::new("/tmp/whatever.jsonl"),
        );
        assert!(matches!(result, Err(ProviderError::Unavailable { .. })));
    }

    fn installed() -> Option<RipgrepProvider> {
        let provider = RipgrepProvider::new(&ContentConfig::default());
        provider.tool().is_some().then_some(provider)
    }

    #[test]
    fn test_live_search_finds_case_insensitive_matches() {
        let Some(provider) = installed() else {
            return;
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        fs::write(
            &path,
            "{\"content\":\"OAuth setup\"}\n{\"content\":\"nothing\"}\n{\"content\":\"the oauth token\"}\n",
        )
        .unwrap();

        let matches = provider
            .search(&SearchContext::background(), "OAuth", &path)
            .unwrap();
        let lines: Vec<usize> = matches.iter().map(|m| m.line_number).collect();
        assert_eq!(lines, vec![1, 3]);
        for m in &matches {
            let (start, end) = m.span.unwrap();
            assert!(m.text[start..end].eq_ignore_ascii_case("oauth"));
        }
    }

    #[test]
    fn test_live_search_no_matches_is_ok() {
        let Some(provider) = installed() else {
            return;
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        fs::write(&path, "{\"content\":\"hello\"}\n").unwrap();

        let matches = provider
            .search(&SearchContext::background(), "webpack", &path)
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_live_search_missing_file_fails() {
        let Some(provider) = installed() else {
            return;
        };
        let dir = tempdir().unwrap();
        let result = provider.search(
            &SearchContext::background(),
            "x",
            &dir.path().join("missing.jsonl"),
        );
        assert!(matches!(result, Err(ProviderError::Failed { .. })));
    }
}
