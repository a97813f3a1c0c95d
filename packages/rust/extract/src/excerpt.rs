//! Bounded "search excerpt" around a needle.
//!
//! The context text is whitespace-collapsed, the needle is located
//! case-insensitively, and a window of `radius` characters on either side is
//! kept, snapped to word boundaries. Elided text on either side is marked
//! with `…`. The result never exceeds `max_len` characters.

use std::ops::Range;
use std::sync::LazyLock;

use linkback_shared::ExcerptOptions;
use regex::Regex;

const ELLIPSIS: char = '…';

/// Collapse runs of whitespace into single spaces and trim.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    WS_RE.replace_all(text, " ").trim().to_string()
}

/// Build an excerpt of `context` around the first occurrence of `needle`.
///
/// If the needle does not occur, the start of the context is used.
pub fn search_excerpt(needle: &str, context: &str, opts: &ExcerptOptions) -> String {
    let text = collapse_whitespace(context);
    if text.is_empty() || opts.max_len == 0 {
        return String::new();
    }

    match locate(&collapse_whitespace(needle), &text) {
        Some(span) => excerpt_around(&text, span, opts),
        None => truncate_words(&text, opts.max_len),
    }
}

/// Build an excerpt of already collapsed `text` around the byte range `span`.
///
/// `span` must fall on char boundaries; an out-of-range span is clamped.
pub fn excerpt_around(text: &str, span: Range<usize>, opts: &ExcerptOptions) -> String {
    if text.is_empty() || opts.max_len == 0 {
        return String::new();
    }
    let end = span.end.min(text.len());
    let start = span.start.min(end);

    let needle_chars = text[start..end].chars().count();
    // Room for the needle plus "… " and " …".
    let budget = opts.max_len.saturating_sub(needle_chars + 4) / 2;
    if budget == 0 && needle_chars + 4 > opts.max_len {
        return truncate_words(&text[start..], opts.max_len);
    }
    let radius = opts.radius.min(budget);

    let from = window_start(text, start, radius);
    let to = window_end(text, end, radius);

    let mut excerpt = String::with_capacity(to - from + 8);
    if from > 0 {
        excerpt.push(ELLIPSIS);
        excerpt.push(' ');
    }
    excerpt.push_str(text[from..to].trim());
    if to < text.len() {
        excerpt.push(' ');
        excerpt.push(ELLIPSIS);
    }
    excerpt
}

/// Byte range of `needle` in `text`, case-insensitive.
fn locate(needle: &str, text: &str) -> Option<Range<usize>> {
    if needle.is_empty() {
        return None;
    }
    let re = Regex::new(&format!("(?i){}", regex::escape(needle))).ok()?;
    re.find(text).map(|m| m.range())
}

/// Walk back up to `radius` chars from `pos`, then forward to a word start.
fn window_start(text: &str, pos: usize, radius: usize) -> usize {
    if radius == 0 {
        return pos;
    }
    let Some((idx, _)) = text[..pos].char_indices().rev().take(radius).last() else {
        return pos;
    };
    if idx == 0 {
        return 0;
    }
    // A space right before `idx` means we already sit on a word start.
    if text[..idx].ends_with(' ') {
        return idx;
    }
    match text[idx..pos].find(' ') {
        Some(space) => idx + space + 1,
        None => pos,
    }
}

/// Walk forward up to `radius` chars from `pos`, then back to a word end.
fn window_end(text: &str, pos: usize, radius: usize) -> usize {
    if radius == 0 {
        return pos;
    }
    let idx = match text[pos..].char_indices().nth(radius) {
        Some((offset, _)) => pos + offset,
        None => return text.len(),
    };
    if text[idx..].starts_with(' ') {
        return idx;
    }
    match text[pos..idx].rfind(' ') {
        Some(space) => pos + space,
        None => pos,
    }
}

/// Cut `text` to at most `max_len` chars at a word boundary, marking the cut.
fn truncate_words(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let keep = max_len.saturating_sub(1);
    let cut = text
        .char_indices()
        .nth(keep)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let head = &text[..cut];
    let head = match head.rfind(' ') {
        Some(space) if space > 0 => &head[..space],
        _ => head,
    };
    let mut out = head.trim_end().to_string();
    out.push(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(radius: usize, max_len: usize) -> ExcerptOptions {
        ExcerptOptions { radius, max_len }
    }

    #[test]
    fn short_context_is_kept_whole() {
        let excerpt = search_excerpt("this article", "See  this article\n for more.", &opts(60, 256));
        assert_eq!(excerpt, "See this article for more.");
    }

    #[test]
    fn window_snaps_to_word_boundaries() {
        let context = "alpha bravo charlie delta echo foxtrot golf hotel india juliet";
        let excerpt = search_excerpt("echo", context, &opts(8, 256));
        assert_eq!(excerpt, "… delta echo foxtrot …");
    }

    #[test]
    fn needle_match_is_case_insensitive() {
        let excerpt = search_excerpt("THIS ARTICLE", "Read this article today", &opts(60, 256));
        assert!(excerpt.contains("this article"));
    }

    #[test]
    fn missing_needle_falls_back_to_leading_text() {
        let context = "one two three four five six seven";
        let excerpt = search_excerpt("zebra", context, &opts(60, 12));
        assert_eq!(excerpt, "one two…");
    }

    #[test]
    fn result_is_bounded_by_max_len() {
        let context = "word ".repeat(200) + "the link text " + &"tail ".repeat(200);
        let excerpt = search_excerpt("the link text", &context, &opts(500, 64));
        assert!(excerpt.chars().count() <= 64, "{excerpt}");
        assert!(excerpt.contains("the link text"));
        assert!(excerpt.starts_with('…'));
        assert!(excerpt.ends_with('…'));
    }

    #[test]
    fn oversized_needle_is_truncated() {
        let needle = "long ".repeat(30);
        let excerpt = search_excerpt(&needle, &needle, &opts(60, 20));
        assert!(excerpt.chars().count() <= 20);
        assert!(excerpt.ends_with('…'));
    }

    #[test]
    fn multibyte_text_is_sliced_safely() {
        let context = "déjà vu über naïve café crème brûlée façade jalapeño";
        let excerpt = search_excerpt("café", context, &opts(7, 256));
        assert_eq!(excerpt, "… naïve café crème …");
    }

    #[test]
    fn window_is_placed_at_given_span() {
        let text = "here is one link and later here is the real one";
        let start = text.rfind("here").unwrap();
        let excerpt = excerpt_around(text, start..start + 4, &opts(8, 256));
        assert_eq!(excerpt, "… later here is the …");
    }

    #[test]
    fn empty_context_yields_empty_excerpt() {
        assert_eq!(search_excerpt("x", "  \n\t ", &opts(60, 256)), "");
    }
}
