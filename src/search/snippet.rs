//! Readable snippets from structured transcript lines
//!
//! Transcript lines are JSON records. Showing the record envelope around a
//! match is useless to a reader, so the snippet is cut from the free-text
//! field that contains the match whenever one can be found.

/// Bytes kept on each side of a match inside a text field.
const FIELD_WINDOW: usize = 50;
/// Bytes kept on each side of a match when falling back to the whole line.
const LINE_WINDOW: usize = 30;
const ELLIPSIS: &str = "...";
const TEXT_FIELDS: [&str; 2] = ["content", "text"];

/// Derives a short snippet around the match `text[start..end]`.
///
/// Never fails: offsets are clamped into `text`, and a line without a
/// recognisable text field gets a plain window around the match.
pub fn extract_context(text: &str, start: usize, end: usize) -> String {
    let end = end.min(text.len());
    let start = start.min(end);

    if let Some((field_start, field_end)) = locate_field(text, start, end) {
        let field = &text[field_start..field_end];
        return window(field, start - field_start, end - field_start, FIELD_WINDOW);
    }
    window(text, start, end, LINE_WINDOW)
}

/// Byte span of the first string-valued text field whose value contains
/// `start..end`.
fn locate_field(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    TEXT_FIELDS.iter().find_map(|key| {
        let needle = format!("\"{key}\":");
        text.match_indices(&needle)
            .filter_map(|(at, _)| string_value_span(text, at + needle.len()))
            .find(|&(value_start, value_end)| value_start <= start && end <= value_end)
    })
}

/// Span of the JSON string starting at `from` (after optional whitespace),
/// excluding its quotes. `None` when there is no string or it never closes.
fn string_value_span(text: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if bytes.get(i) != Some(&b'"') {
        return None;
    }

    let value_start = i + 1;
    let mut j = value_start;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'"' => return Some((value_start, j)),
            _ => j += 1,
        }
    }
    None
}

fn window(text: &str, start: usize, end: usize, radius: usize) -> String {
    let from = floor_char_boundary(text, start.saturating_sub(radius));
    let to = ceil_char_boundary(text, end.saturating_add(radius));

    let mut snippet = String::with_capacity(to - from + 2 * ELLIPSIS.len());
    if from > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.push_str(&text[from..to]);
    if to < text.len() {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn span_of(text: &str, needle: &str) -> (usize, usize) {
        let start = text.find(needle).unwrap();
        (start, start + needle.len())
    }

    #[test]
    fn test_message_line_shows_content_only() {
        let line = r#"{"type":"message","role":"user","content":"I need help with OAuth implementation"}"#;
        let (start, end) = span_of(line, "OAuth");

        let snippet = extract_context(line, start, end);

        assert_eq!(snippet, "I need help with OAuth implementation");
        assert!(snippet.len() < line.len());
        assert!(!snippet.contains(r#""type":"message""#));
    }

    #[test]
    fn test_long_content_is_clipped_on_both_sides() {
        let body = format!("{}OAuth{}", "a".repeat(80), "b".repeat(80));
        let line = format!(r#"{{"type":"message","content":"{body}"}}"#);
        let (start, end) = span_of(&line, "OAuth");

        let snippet = extract_context(&line, start, end);

        assert_eq!(
            snippet,
            format!("...{}OAuth{}...", "a".repeat(50), "b".repeat(50))
        );
    }

    #[test]
    fn test_clipping_is_bounded_by_the_field() {
        let line = format!(
            r#"{{"content":"OAuth {}","type":"message"}}"#,
            "z".repeat(10)
        );
        let (start, end) = span_of(&line, "OAuth");

        let snippet = extract_context(&line, start, end);
        assert_eq!(snippet, format!("OAuth {}", "z".repeat(10)));
    }

    #[test]
    fn test_match_outside_field_uses_line_window() {
        let line = format!(
            r#"{{"content":"short","note":"{}OAuth{}"}}"#,
            "x".repeat(40),
            "y".repeat(40)
        );
        let (start, end) = span_of(&line, "OAuth");

        let snippet = extract_context(&line, start, end);
        assert_eq!(
            snippet,
            format!("...{}OAuth{}...", "x".repeat(30), "y".repeat(30))
        );
    }

    #[test]
    fn test_plain_line_without_field() {
        let snippet = extract_context("error: OAuth token expired", 7, 12);
        assert_eq!(snippet, "error: OAuth token expired");
    }

    #[test]
    fn test_escaped_quotes_stay_inside_field() {
        let line = r#"{"content":"she said \"use OAuth\" twice","type":"message"}"#;
        let (start, end) = span_of(line, "OAuth");

        let snippet = extract_context(line, start, end);
        assert_eq!(snippet, r#"she said \"use OAuth\" twice"#);
    }

    #[test]
    fn test_text_field_inside_content_array() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Configure the OAuth callback"}]}}"#;
        let (start, end) = span_of(line, "OAuth");

        assert_eq!(
            extract_context(line, start, end),
            "Configure the OAuth callback"
        );
    }

    #[test]
    fn test_spaced_key_spelling() {
        let line = r#"{"role": "user", "content": "token refresh with OAuth"}"#;
        let (start, end) = span_of(line, "OAuth");
        assert_eq!(extract_context(line, start, end), "token refresh with OAuth");
    }

    #[test]
    fn test_window_never_splits_characters() {
        let body = format!("{}OAuth{}", "é".repeat(40), "ü".repeat(40));
        let (start, end) = span_of(&body, "OAuth");

        let snippet = extract_context(&body, start, end);
        assert!(snippet.contains("OAuth"));
        assert!(snippet.starts_with(ELLIPSIS));
        assert!(snippet.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_out_of_range_offsets_are_clamped() {
        assert_eq!(extract_context("tiny", 10, 20), "tiny");
        assert_eq!(extract_context("", 0, 0), "");
    }

    fn boundaries(text: &str) -> Vec<usize> {
        text.char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_snippet_contains_match(text in ".{0,200}", a in 0usize..400, b in 0usize..400) {
            let bounds = boundaries(&text);
            let mut start = bounds[a % bounds.len()];
            let mut end = bounds[b % bounds.len()];
            if start > end {
                std::mem::swap(&mut start, &mut end);
            }

            let snippet = extract_context(&text, start, end);
            prop_assert!(snippet.contains(&text[start..end]));
        }

        #[test]
        fn prop_content_envelope_is_hidden(body in "[a-zA-Z ]{0,300}", a in 0usize..300, len in 0usize..10) {
            let line = format!(r#"{{"type":"message","role":"user","content":"{body}"}}"#);
            let offset = line.len() - r#""}"#.len() - body.len();
            let rel_start = a.min(body.len());
            let rel_end = (rel_start + len).min(body.len());

            let snippet = extract_context(&line, offset + rel_start, offset + rel_end);
            prop_assert!(!snippet.contains(r#""type":"message""#));
            prop_assert!(snippet.contains(&body[rel_start..rel_end]));
        }
    }
}
