//! Span protection.
//!
//! Literal code regions are swapped for placeholder tokens before any
//! extension syntax is rewritten, then swapped back at the end. Extension
//! syntax that happens to appear inside code therefore survives untouched.
//!
//! A placeholder is `U+E000`, a decimal id, `U+E001`. Both delimiters are
//! private-use characters, so they never collide with markup the later stages
//! look for.

use std::collections::HashMap;
use std::fmt::Write;

use crate::fence::FenceTracker;
use crate::util::{dedent, indent_width, leading_whitespace};

/// Opening delimiter of a placeholder token.
pub const PLACEHOLDER_START: char = '\u{E000}';
/// Closing delimiter of a placeholder token.
pub const PLACEHOLDER_END: char = '\u{E001}';

/// A code region replaced by a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedSpan {
    /// Id embedded in the placeholder token, unique within the document.
    pub id: usize,
    /// The exact text the placeholder stands for.
    pub original_text: String,
    /// Indent width of the line the span started on. Continuation lines of a
    /// fenced block are shifted when the placeholder has moved to another
    /// column by the time it is restored.
    pub indent: usize,
}

impl ProtectedSpan {
    /// The placeholder token for this span.
    #[must_use]
    pub fn placeholder(&self) -> String {
        placeholder(self.id)
    }
}

/// Result of [`protect`]: masked text plus the spans it stands for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Protected {
    /// Document with every code region replaced by a placeholder.
    pub masked: String,
    /// Protected regions in order of substitution.
    pub spans: Vec<ProtectedSpan>,
}

impl Protected {
    /// Restore this document's spans in `text`.
    #[must_use]
    pub fn restore(&self, text: &str) -> String {
        restore(text, &self.spans)
    }
}

fn placeholder(id: usize) -> String {
    format!("{PLACEHOLDER_START}{id}{PLACEHOLDER_END}")
}

/// Id and byte length of the placeholder token at the start of `s`.
///
/// Returns `None` when `s` does not start with a well-formed token.
pub(crate) fn parse_placeholder(s: &str) -> Option<(usize, usize)> {
    let rest = s.strip_prefix(PLACEHOLDER_START)?;
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 || !rest[digits..].starts_with(PLACEHOLDER_END) {
        return None;
    }
    let id = rest[..digits].parse().ok()?;
    Some((id, PLACEHOLDER_START.len_utf8() + digits + PLACEHOLDER_END.len_utf8()))
}

/// Mask fenced code blocks and inline code spans.
///
/// A fenced block (opening line through closing line) becomes one placeholder
/// line; the opening line's indentation stays outside the token so the block
/// keeps its place in list items. A fence that is never closed runs to the end
/// of the document, as it does for the markdown parser. Inline code is a run of
/// backticks matched by the next run of the same length on the same line.
///
/// Regions that already contain a placeholder delimiter are left alone, and ids
/// start above any token already present, so masking masked text is harmless.
///
/// # Example
///
/// ```
/// use lumen_renderer::protect;
///
/// let doc = "Use `==x==` here.";
/// let protected = protect(doc);
/// assert!(!protected.masked.contains("==x=="));
/// assert_eq!(protected.restore(&protected.masked), doc);
/// ```
#[must_use]
pub fn protect(document: &str) -> Protected {
    let mut masker = Masker {
        masked: String::with_capacity(document.len()),
        spans: Vec::new(),
        next_id: first_free_id(document),
    };

    let mut tracker = FenceTracker::new();
    let mut block: Vec<&str> = Vec::new();

    for line in document.split_inclusive('\n') {
        if tracker.in_fence() {
            block.push(line);
            if tracker.update(line) {
                masker.fenced_block(&block);
                block.clear();
            }
        } else if tracker.update(line) {
            block.push(line);
        } else {
            masker.line(line);
        }
    }
    if !block.is_empty() {
        masker.fenced_block(&block);
    }

    Protected {
        masked: masker.masked,
        spans: masker.spans,
    }
}

/// Put protected text back.
///
/// Works backward through `spans` (reverse order of substitution); each
/// placeholder is replaced at most once, and restored text is never scanned
/// again. Tokens whose span is not in `spans` are left as they are.
///
/// A fenced block whose placeholder line was re-indented comes back with all
/// of its lines moved by the same number of columns.
#[must_use]
pub fn restore(text: &str, spans: &[ProtectedSpan]) -> String {
    if spans.is_empty() || !text.contains(PLACEHOLDER_START) {
        return text.to_owned();
    }

    let mut pending: HashMap<usize, &ProtectedSpan> =
        spans.iter().rev().map(|span| (span.id, span)).collect();

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(PLACEHOLDER_START) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match parse_placeholder(tail) {
            Some((id, len)) => {
                match pending.remove(&id) {
                    Some(span) => push_restored(&mut out, span),
                    None => out.push_str(&tail[..len]),
                }
                rest = &tail[len..];
            }
            None => {
                out.push(PLACEHOLDER_START);
                rest = &tail[PLACEHOLDER_START.len_utf8()..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Append a span's text, following the column its placeholder now sits at.
fn push_restored(out: &mut String, span: &ProtectedSpan) {
    let text = span.original_text.as_str();
    let line = &out[out.rfind('\n').map_or(0, |i| i + 1)..];
    let column = (leading_whitespace(line).len() == line.len()).then(|| indent_width(line));

    let Some(column) = column.filter(|&c| c != span.indent && text.contains('\n')) else {
        out.push_str(text);
        return;
    };
    let (first, rest) = text.split_at(text.find('\n').map_or(text.len(), |i| i + 1));
    out.push_str(first);
    if column < span.indent {
        out.push_str(&dedent(rest, span.indent - column));
    } else {
        for line in rest.split_inclusive('\n') {
            if !line.trim().is_empty() {
                out.extend(std::iter::repeat_n(' ', column - span.indent));
            }
            out.push_str(line);
        }
    }
}

struct Masker {
    masked: String,
    spans: Vec<ProtectedSpan>,
    next_id: usize,
}

impl Masker {
    fn push_span(&mut self, original: &str, indent: usize) {
        let id = self.next_id;
        self.next_id += 1;
        let _ = write!(self.masked, "{PLACEHOLDER_START}{id}{PLACEHOLDER_END}");
        self.spans.push(ProtectedSpan {
            id,
            original_text: original.to_owned(),
            indent,
        });
    }

    fn fenced_block(&mut self, lines: &[&str]) {
        let joined = lines.concat();
        if joined.contains(PLACEHOLDER_START) || joined.contains(PLACEHOLDER_END) {
            self.masked.push_str(&joined);
            return;
        }

        let indent = leading_whitespace(&joined);
        let body = &joined[indent.len()..];
        let (body, newline) = match body.strip_suffix('\n') {
            Some(stripped) => (stripped, "\n"),
            None => (body, ""),
        };
        self.masked.push_str(indent);
        self.push_span(body, indent_width(indent));
        self.masked.push_str(newline);
    }

    fn line(&mut self, line: &str) {
        let mut rest = line;
        while let Some(start) = rest.find('`') {
            let escaped = rest[..start].ends_with('\\');
            self.masked.push_str(&rest[..start]);
            let run = &rest[start..];
            let ticks = run.chars().take_while(|&c| c == '`').count();

            if escaped {
                self.masked.push('`');
                rest = &run[1..];
                continue;
            }

            match find_closing_run(&run[ticks..], ticks) {
                Some(close) => {
                    let span = &run[..ticks + close + ticks];
                    if span.contains(PLACEHOLDER_START) || span.contains(PLACEHOLDER_END) {
                        self.masked.push_str(span);
                    } else {
                        self.push_span(span, 0);
                    }
                    rest = &run[span.len()..];
                }
                None => {
                    self.masked.push_str(&run[..ticks]);
                    rest = &run[ticks..];
                }
            }
        }
        self.masked.push_str(rest);
    }
}

/// Offset of the next backtick run of exactly `ticks`, not crossing a newline.
fn find_closing_run(s: &str, ticks: usize) -> Option<usize> {
    let line_end = s.find('\n').unwrap_or(s.len());
    let s = &s[..line_end];
    let mut offset = 0;
    while let Some(pos) = s[offset..].find('`') {
        let start = offset + pos;
        let len = s[start..].chars().take_while(|&c| c == '`').count();
        if len == ticks {
            return Some(start);
        }
        offset = start + len;
    }
    None
}

/// Smallest id greater than every placeholder id already in `document`.
fn first_free_id(document: &str) -> usize {
    let mut next = 0;
    let mut rest = document;
    while let Some(pos) = rest.find(PLACEHOLDER_START) {
        let tail = &rest[pos..];
        if let Some((id, len)) = parse_placeholder(tail) {
            next = next.max(id.saturating_add(1));
            rest = &tail[len..];
        } else {
            rest = &tail[PLACEHOLDER_START.len_utf8()..];
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip(doc: &str) {
        let protected = protect(doc);
        assert_eq!(protected.restore(&protected.masked), doc);
    }

    #[test]
    fn test_inline_code_is_masked() {
        let protected = protect("a `==b==` c");
        assert_eq!(protected.spans.len(), 1);
        assert_eq!(protected.spans[0].original_text, "`==b==`");
        assert_eq!(protected.masked, format!("a {} c", placeholder(0)));
    }

    #[test]
    fn test_double_backtick_span_contains_single() {
        let protected = protect("x ``a ` b`` y");
        assert_eq!(protected.spans[0].original_text, "``a ` b``");
    }

    #[test]
    fn test_unmatched_backticks_stay() {
        let protected = protect("a ` b\nc ` d");
        assert!(protected.spans.is_empty());
        assert_eq!(protected.masked, "a ` b\nc ` d");
    }

    #[test]
    fn test_escaped_backtick_not_code() {
        let protected = protect(r"a \`b` c");
        assert!(protected.spans.is_empty());
    }

    #[test]
    fn test_fenced_block_becomes_one_line() {
        let doc = "before\n  ```md\n  :::alert{}\n  x\n  :::\n  ```\nafter\n";
        let protected = protect(doc);
        assert_eq!(protected.spans.len(), 1);
        assert_eq!(
            protected.masked,
            format!("before\n  {}\nafter\n", placeholder(0))
        );
        assert!(protected.spans[0].original_text.starts_with("```md\n"));
        assert!(protected.spans[0].original_text.ends_with("  ```"));
        round_trip(doc);
    }

    #[test]
    fn test_longer_fence_holds_shorter() {
        let doc = "````\n```\n==not==\n```\n````\ntext";
        let protected = protect(doc);
        assert_eq!(protected.spans.len(), 1);
        assert_eq!(protected.masked, format!("{}\ntext", placeholder(0)));
        round_trip(doc);
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let doc = "text\n~~~\n:::tabs\n@tab A";
        let protected = protect(doc);
        assert_eq!(protected.masked, format!("text\n{}", placeholder(0)));
        round_trip(doc);
    }

    #[test]
    fn test_existing_placeholder_not_reprotected() {
        let first = protect("a `b` c");
        let second = protect(&first.masked);
        assert!(second.spans.is_empty());
        assert_eq!(second.masked, first.masked);
    }

    #[test]
    fn test_ids_avoid_existing_tokens() {
        let doc = format!("{} and `code`", placeholder(7));
        let protected = protect(&doc);
        assert_eq!(protected.spans[0].id, 8);
        assert_eq!(protected.restore(&protected.masked), doc);
    }

    #[test]
    fn test_restore_each_span_once() {
        let spans = vec![ProtectedSpan {
            id: 0,
            original_text: "`x`".to_owned(),
            indent: 0,
        }];
        let text = format!("{0}{0}", placeholder(0));
        assert_eq!(restore(&text, &spans), format!("`x`{}", placeholder(0)));
    }

    #[test]
    fn test_restore_follows_dedented_placeholder() {
        let protected = protect("    ```\n    code\n\n      deeper\n    ```\n");
        let moved = protected.masked.trim_start();
        assert_eq!(
            protected.restore(moved),
            "```\ncode\n\n  deeper\n```\n"
        );
    }

    #[test]
    fn test_restore_follows_indented_placeholder() {
        let protected = protect("  ```\n  code\n\n  ```\n");
        let moved = format!("     {}", protected.masked.trim_start());
        assert_eq!(
            protected.restore(&moved),
            "     ```\n     code\n\n     ```\n"
        );
    }

    #[test]
    fn test_restore_keeps_inline_span_in_place() {
        let protected = protect("    text `a` end");
        let moved = protected.masked.trim_start();
        assert_eq!(protected.restore(moved), "text `a` end");
    }

    #[test]
    fn test_round_trip_assorted() {
        for doc in [
            "",
            "plain",
            "`a` `b` ``c``\n\n```\ncode\n```\n",
            "- item\n\n    ```rust\n    fn x() {}\n    ```\n",
            "tabs\tand ünïcödé `ñ`",
            "\u{E000}stray",
            "trailing `",
        ] {
            round_trip(doc);
        }
    }
}
