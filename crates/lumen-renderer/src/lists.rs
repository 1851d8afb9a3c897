//! Ordered-list numbering.
//!
//! pulldown-cmark only keeps the start number of an ordered list and needs
//! nested items indented past the parent's marker to see the nesting at all.
//! [`reindent_nested_lists`] normalizes shallow nested items before rendering.
//! [`scan_ordered_lists`] records the number the author wrote for every item
//! the parser sees, and [`renumber_list_items`] writes those numbers back onto
//! the rendered `<li>` elements in the same order.

use std::fmt::Write;
use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::util::indent_width;

static ORDERED_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ \t]*)(\d{1,9})[.)](?:[ \t]|$)").expect("invalid ordered item regex")
});

/// One ordered-list item as written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedListEntry {
    /// The number the author wrote.
    pub number: u64,
    /// Column of the item marker.
    pub indent: usize,
}

/// Parse an ordered-list item line into (indent width, number).
fn parse_item(line: &str) -> Option<(usize, u64)> {
    let caps = ORDERED_ITEM.captures(line)?;
    let number = caps[2].parse().ok()?;
    Some((indent_width(&caps[1]), number))
}

/// Collect every ordered-list item of `text` in document order.
///
/// `text` is parsed with the same `options` the renderer uses, so the entries
/// line up one to one with the ordered `<li>` elements it emits, including
/// items inside block quotes and alerts. Lines that only look like items
/// (inside code, HTML blocks or paragraphs) are never recorded.
#[must_use]
pub fn scan_ordered_lists(text: &str, options: Options) -> Vec<OrderedListEntry> {
    let mut entries = Vec::new();
    // One slot per open list: `Some(last number)` for ordered lists.
    let mut lists: Vec<Option<u64>> = Vec::new();

    for (event, range) in Parser::new_ext(text, options).into_offset_iter() {
        match event {
            Event::Start(Tag::List(start)) => lists.push(start.map(|n| n.saturating_sub(1))),
            Event::End(TagEnd::List(_)) => {
                lists.pop();
            }
            Event::Start(Tag::Item) => {
                if let Some(Some(last)) = lists.last_mut() {
                    let (number, indent) = item_marker(text, range.start)
                        .unwrap_or((*last + 1, 0));
                    *last = number;
                    entries.push(OrderedListEntry { number, indent });
                }
            }
            _ => {}
        }
    }
    entries
}

/// Number and column of the ordered marker of the item starting at `offset`.
fn item_marker(text: &str, offset: usize) -> Option<(u64, usize)> {
    let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let rest = &text[offset..];
    let marker = rest.trim_start_matches([' ', '\t', '>']);
    let digits = marker.chars().take_while(char::is_ascii_digit).count();
    let number = marker[..digits].parse().ok()?;

    let prefix = &text[line_start..offset + (rest.len() - marker.len())];
    let indent = if prefix.trim().is_empty() {
        indent_width(prefix)
    } else {
        prefix.chars().count()
    };
    Some((number, indent))
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Indent in the source.
    src: usize,
    /// Indent after normalization.
    norm: usize,
}

/// Push nested ordered items at least `min_indent` columns past their parent.
///
/// Continuation lines move with the item they belong to. Already normalized
/// text is returned unchanged.
#[must_use]
pub fn reindent_nested_lists(text: &str, min_indent: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut frames: Vec<Frame> = Vec::new();

    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            out.push_str(line);
            continue;
        }
        let width = indent_width(line);

        if parse_item(line).is_some() {
            while frames.last().is_some_and(|f| f.src > width) {
                frames.pop();
            }
            let norm = match frames.last() {
                Some(top) if top.src == width => {
                    let norm = top.norm;
                    frames.pop();
                    norm
                }
                Some(parent) => parent.norm + (width - parent.src).max(min_indent),
                None => width,
            };
            frames.push(Frame { src: width, norm });
            push_reindented(&mut out, line, width, norm);
        } else if width == 0 {
            frames.clear();
            out.push_str(line);
        } else {
            let delta = frames
                .iter()
                .rev()
                .find(|f| f.src <= width)
                .map_or(0, |f| f.norm - f.src);
            push_reindented(&mut out, line, width, width + delta);
        }
    }
    out
}

fn push_reindented(out: &mut String, line: &str, from: usize, to: usize) {
    if from == to {
        out.push_str(line);
        return;
    }
    let content = line.trim_start_matches([' ', '\t']);
    out.extend(std::iter::repeat_n(' ', to));
    out.push_str(content);
}

/// Give every ordered `<li>` in `html` an explicit `value`.
///
/// Items take their numbers from `entries` in document order. Once the
/// entries run out, an item continues from its previous sibling.
#[must_use]
pub fn renumber_list_items(html: &str, entries: &[OrderedListEntry]) -> String {
    let mut out = String::with_capacity(html.len() + entries.len() * 12);
    // One slot per open list: `Some(last value)` for `<ol>`, `None` for `<ul>`.
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut next = entries.iter();
    let mut rest = html;

    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if rest.starts_with("<!--") {
            let end = rest.find("-->").map_or(rest.len(), |i| i + 3);
            out.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }

        let end = rest.find('>').map_or(rest.len(), |i| i + 1);
        let tag = &rest[..end];
        match tag_name(tag) {
            "ol" => lists.push(Some(0)),
            "ul" => lists.push(None),
            "/ol" | "/ul" => {
                lists.pop();
            }
            "li" if !tag.contains("value=") => {
                if let Some(Some(last)) = lists.last_mut() {
                    let value = next.next().map_or(*last + 1, |entry| entry.number);
                    *last = value;
                    let _ = write!(out, r#"<li value="{value}""#);
                    out.push_str(&tag[3..]);
                    rest = &rest[end..];
                    continue;
                }
            }
            _ => {}
        }
        out.push_str(tag);
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

/// Name of a tag, with a leading `/` for end tags.
fn tag_name(tag: &str) -> &str {
    let inner = &tag[1..];
    let start = usize::from(inner.starts_with('/'));
    let end = inner[start..]
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .map_or(inner.len(), |i| start + i);
    &inner[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::MarkdownRenderer;
    use crate::HtmlBackend;
    use pretty_assertions::assert_eq;

    fn entry(number: u64, indent: usize) -> OrderedListEntry {
        OrderedListEntry { number, indent }
    }

    fn scan(text: &str) -> Vec<OrderedListEntry> {
        scan_ordered_lists(text, MarkdownRenderer::<HtmlBackend>::new().parser_options())
    }

    fn values(html: &str) -> Vec<&str> {
        html.split("value=\"")
            .skip(1)
            .filter_map(|rest| rest.split('"').next())
            .collect()
    }

    #[test]
    fn test_scan_nested_list() {
        let source = "1. a\n2. b\n    1. c\n    2. d\n3. e";
        assert_eq!(
            scan(source),
            vec![entry(1, 0), entry(2, 0), entry(1, 4), entry(2, 4), entry(3, 0)]
        );
    }

    #[test]
    fn test_scan_explicit_numbers() {
        assert_eq!(
            scan("5. five\n7. seven\n\n9) nine"),
            vec![entry(5, 0), entry(7, 0), entry(9, 0)]
        );
    }

    #[test]
    fn test_scan_skips_number_in_paragraph() {
        let source = "It happened in\n2023. Then more.\n\n1. real";
        assert_eq!(scan(source), vec![entry(1, 0)]);
    }

    #[test]
    fn test_scan_skips_code_and_html() {
        let source = "    1. indented code\n\n```\n2. fenced\n```\n\n<div>\n3. html\n</div>\n\n1. yes\n";
        assert_eq!(scan(source), vec![entry(1, 0)]);
    }

    #[test]
    fn test_scan_items_in_block_quotes() {
        let source = "> 1. a\n> 2. b\n\n> [!NOTE]\n> 3. c\n\n5. x\n";
        assert_eq!(
            scan(source),
            vec![entry(1, 2), entry(2, 2), entry(3, 2), entry(5, 0)]
        );
    }

    #[test]
    fn test_quoted_lists_keep_later_numbers() {
        let source = "> 1. a\n> 2. b\n\n> [!TIP]\n> 3. c\n\n5. x\n6. y\n";
        let entries = scan(source);
        let html = MarkdownRenderer::<HtmlBackend>::new()
            .render_markdown(source)
            .html;
        let html = renumber_list_items(&html, &entries);
        assert_eq!(values(&html), vec!["1", "2", "3", "5", "6"]);
    }

    #[test]
    fn test_reindent_shallow_nesting() {
        let source = "1. a\n  1. b\n     more b\n2. c\n";
        assert_eq!(
            reindent_nested_lists(source, 4),
            "1. a\n    1. b\n       more b\n2. c\n"
        );
    }

    #[test]
    fn test_reindent_keeps_deep_nesting() {
        let source = "1. a\n      1. b\n2. c\n";
        assert_eq!(reindent_nested_lists(source, 4), source);
    }

    #[test]
    fn test_reindent_three_levels() {
        let source = "1. a\n 1. b\n  1. c\n 2. d\n";
        assert_eq!(
            reindent_nested_lists(source, 4),
            "1. a\n    1. b\n        1. c\n    2. d\n"
        );
    }

    #[test]
    fn test_reindent_is_idempotent() {
        let source = "1. a\n  1. b\n   text\n  2. c\n    1. d\nplain\n 1. e\n";
        let once = reindent_nested_lists(source, 4);
        assert_eq!(reindent_nested_lists(&once, 4), once);
    }

    #[test]
    fn test_renumber_values() {
        let html = "<ol><li>a</li><li>b<ol><li>c</li><li>d</li></ol></li><li>e</li></ol>";
        let entries = [entry(1, 0), entry(2, 0), entry(1, 4), entry(2, 4), entry(3, 0)];
        assert_eq!(
            renumber_list_items(html, &entries),
            r#"<ol><li value="1">a</li><li value="2">b<ol><li value="1">c</li><li value="2">d</li></ol></li><li value="3">e</li></ol>"#
        );
    }

    #[test]
    fn test_renumber_skips_unordered_and_comments() {
        let html = "<ul><li>x</li></ul><!--<li>--><ol start=\"4\"><li>y</li></ol>";
        assert_eq!(
            renumber_list_items(html, &[entry(4, 0)]),
            r#"<ul><li>x</li></ul><!--<li>--><ol start="4"><li value="4">y</li></ol>"#
        );
    }

    #[test]
    fn test_renumber_falls_back_to_sequence() {
        let html = "<ol><li>a</li><li>b</li><li>c</li></ol>";
        assert_eq!(
            renumber_list_items(html, &[entry(7, 0)]),
            r#"<ol><li value="7">a</li><li value="8">b</li><li value="9">c</li></ol>"#
        );
    }

    #[test]
    fn test_numbering_fidelity_end_to_end() {
        let source = "1. a\n2. b\n    1. c\n    2. d\n3. e";
        let normalized = reindent_nested_lists(source, 4);
        let entries = scan(&normalized);
        let html = MarkdownRenderer::<HtmlBackend>::new()
            .render_markdown(&normalized)
            .html;
        let html = renumber_list_items(&html, &entries);
        assert_eq!(values(&html), vec!["1", "2", "1", "2", "3"]);
    }
}
