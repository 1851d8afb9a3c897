//! Inline extension rewrites.
//!
//! A single left-to-right scan over each line. At every position the rules
//! are tried in a fixed precedence (highlight, superscript and subscript,
//! attributed image, titled link, icon link); the first that matches emits
//! inline HTML and the scan resumes after it. Escaped characters, existing
//! HTML tags and placeholder tokens are copied through untouched, so running
//! the transform over its own output changes nothing.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

use crate::attrs::AttributeSet;
use crate::protect::parse_placeholder;
use crate::state::escape_html;
use crate::util::css_width;

static ICON_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_:-]+$").expect("invalid icon id regex"));

/// Apply every inline rule to `text`.
///
/// ```
/// use lumen_renderer::transform_inline;
///
/// assert_eq!(transform_inline("a ==b== c"), "a <mark>b</mark> c");
/// assert_eq!(transform_inline("H~2~O x^2^"), "H<sub>2</sub>O x<sup>2</sup>");
/// assert_eq!(transform_inline("~~gone~~"), "~~gone~~");
/// ```
#[must_use]
pub fn transform_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut i = 0;

    while let Some(c) = text[i..].chars().next() {
        let tail = &text[i..];
        let prev = text[..i].chars().next_back();
        let step = match c {
            '\\' => copy_escape(tail, &mut out),
            '<' => copy_tag(tail, &mut out),
            '=' => highlight(tail, prev, &mut out),
            '^' => superscript(tail, &mut out),
            '~' => subscript(tail, &mut out),
            '!' if tail.starts_with("![") => image(tail, &mut out),
            '[' => link(tail, &mut out),
            _ => parse_placeholder(tail).map(|(_, len)| {
                out.push_str(&tail[..len]);
                len
            }),
        };
        match step {
            Some(len) => i += len,
            None => {
                out.push(c);
                i += c.len_utf8();
            }
        }
    }
    out
}

fn copy_escape(tail: &str, out: &mut String) -> Option<usize> {
    let next = tail[1..].chars().next()?;
    let len = 1 + next.len_utf8();
    out.push_str(&tail[..len]);
    Some(len)
}

/// Copy an HTML tag, comment or declaration that ends on the same line.
fn copy_tag(tail: &str, out: &mut String) -> Option<usize> {
    let next = tail[1..].chars().next()?;
    if !(next.is_ascii_alphabetic() || next == '/' || next == '!') {
        return None;
    }
    let line = line_of(tail);
    let end = line.find('>')? + 1;
    out.push_str(&tail[..end]);
    Some(end)
}

/// `==text==`
fn highlight(tail: &str, prev: Option<char>, out: &mut String) -> Option<usize> {
    let run = run_len(tail, '=');
    if run != 2 || prev == Some('=') {
        return Some(copy_run(tail, run, out));
    }
    let line = line_of(tail);
    let body = &line[2..];
    if body.starts_with(char::is_whitespace) {
        return None;
    }

    let mut search = 0;
    while let Some(pos) = body[search..].find('=') {
        let at = search + pos;
        let close_run = run_len(&body[at..], '=');
        if close_run == 2 && at > 0 && !body[..at].ends_with(char::is_whitespace) {
            let inner = &body[..at];
            let _ = write!(out, "<mark>{}</mark>", transform_inline(inner));
            return Some(2 + at + 2);
        }
        search = at + close_run;
    }
    None
}

/// `^text^`
fn superscript(tail: &str, out: &mut String) -> Option<usize> {
    let run = run_len(tail, '^');
    if run != 1 {
        return Some(copy_run(tail, run, out));
    }
    let (inner, len) = tight_span(tail, '^')?;
    let _ = write!(out, "<sup>{}</sup>", transform_inline(inner));
    Some(len)
}

/// `~text~`, leaving `~~strikethrough~~` alone.
fn subscript(tail: &str, out: &mut String) -> Option<usize> {
    let run = run_len(tail, '~');
    if run != 1 {
        return Some(copy_run(tail, run, out));
    }
    let (inner, len) = tight_span(tail, '~')?;
    if tail[len..].starts_with('~') {
        return None;
    }
    let _ = write!(out, "<sub>{}</sub>", transform_inline(inner));
    Some(len)
}

/// A span delimited by `delim` with no whitespace inside.
///
/// Returns the inner text and the length including both delimiters.
fn tight_span(tail: &str, delim: char) -> Option<(&str, usize)> {
    let body = &tail[1..];
    let end = body.find(|c: char| c == delim || c.is_whitespace())?;
    if end == 0 || !body[end..].starts_with(delim) {
        return None;
    }
    Some((&body[..end], end + 2))
}

/// `![alt](url){attrs}` becomes a figure; a plain image is copied as written.
fn image(tail: &str, out: &mut String) -> Option<usize> {
    let parts = parse_link(&tail[1..])?;
    let Some(raw_attrs) = parts.attrs else {
        let end = 1 + parts.end;
        out.push_str(&tail[..end]);
        return Some(end);
    };

    let attrs = AttributeSet::parse(raw_attrs);
    let align = attrs.get_or("align", "center");
    let _ = write!(out, r#"<figure class="image align-{}""#, escape_html(align));
    if let Some(width) = attrs.get_non_empty("width") {
        let _ = write!(out, r#" style="width:{}""#, escape_html(&css_width(width)));
    }
    let _ = write!(
        out,
        r#"><img src="{}" alt="{}""#,
        escape_html(parts.dest),
        escape_html(parts.text)
    );
    if let Some(title) = parts.title {
        let _ = write!(out, r#" title="{}""#, escape_html(title));
    }
    out.push('>');
    if let Some(caption) = attrs.get_non_empty("caption") {
        let _ = write!(out, "<figcaption>{}</figcaption>", escape_html(caption));
    }
    out.push_str("</figure>");
    Some(1 + parts.end_with_attrs)
}

/// Titled and icon links become anchors; other links keep their markdown
/// with the link text transformed.
fn link(tail: &str, out: &mut String) -> Option<usize> {
    let parts = parse_link(tail)?;
    let text = transform_inline(parts.text);

    if let Some(title) = parts.title {
        let _ = write!(
            out,
            r#"<a href="{}" title="{}">{text}</a>"#,
            escape_html(parts.dest),
            escape_html(title)
        );
        return Some(parts.end);
    }

    if let Some(icon) = parts.attrs.map(str::trim).filter(|id| ICON_ID.is_match(id)) {
        let icon = escape_html(icon);
        let _ = write!(
            out,
            r#"<a href="{}" class="icon-link" data-icon="{icon}"><span class="icon icon-{icon}" aria-hidden="true"></span>{text}</a>"#,
            escape_html(parts.dest),
        );
        return Some(parts.end_with_attrs);
    }

    out.push('[');
    out.push_str(&text);
    out.push_str(&tail[1 + parts.text.len()..parts.end]);
    Some(parts.end)
}

/// Pieces of `[text](dest "title"){attrs}`, all on one line.
#[derive(Debug, PartialEq, Eq)]
struct LinkParts<'a> {
    text: &'a str,
    dest: &'a str,
    title: Option<&'a str>,
    attrs: Option<&'a str>,
    /// Offset just past `)`.
    end: usize,
    /// Offset just past `}` when attrs are present, otherwise `end`.
    end_with_attrs: usize,
}

fn parse_link(tail: &str) -> Option<LinkParts<'_>> {
    let line = line_of(tail);
    let close = closing_bracket(line)?;
    let text = &line[1..close];

    let mut pos = close + 1;
    if !line[pos..].starts_with('(') {
        return None;
    }
    pos += 1;
    pos += leading_spaces(&line[pos..]);

    let dest_len = destination_len(&line[pos..])?;
    let dest = line[pos..pos + dest_len].trim_start_matches('<').trim_end_matches('>');
    pos += dest_len;
    pos += leading_spaces(&line[pos..]);

    let mut title = None;
    if let Some(quote) = line[pos..].chars().next().filter(|&c| c == '"' || c == '\'') {
        let len = line[pos + 1..].find(quote)?;
        title = Some(&line[pos + 1..pos + 1 + len]);
        pos += len + 2;
        pos += leading_spaces(&line[pos..]);
    }
    if !line[pos..].starts_with(')') {
        return None;
    }
    let end = pos + 1;

    let (attrs, end_with_attrs) = match line[end..].strip_prefix('{') {
        Some(rest) => match rest.find('}') {
            Some(len) => (Some(&rest[..len]), end + len + 2),
            None => (None, end),
        },
        None => (None, end),
    };

    Some(LinkParts {
        text,
        dest,
        title,
        attrs,
        end,
        end_with_attrs,
    })
}

/// Index of the `]` matching the `[` at the start of `line`.
fn closing_bracket(line: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = line.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Length of a link destination: `<...>` or a run without spaces whose
/// parentheses balance.
fn destination_len(s: &str) -> Option<usize> {
    if s.starts_with('<') {
        return s.find('>').map(|i| i + 1);
    }
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            c if c.is_whitespace() => return (depth == 0).then_some(i),
            _ => {}
        }
    }
    None
}

fn line_of(tail: &str) -> &str {
    tail.find('\n').map_or(tail, |end| &tail[..end])
}

fn run_len(s: &str, c: char) -> usize {
    s.chars().take_while(|&x| x == c).count()
}

fn leading_spaces(s: &str) -> usize {
    s.len() - s.trim_start_matches([' ', '\t']).len()
}

fn copy_run(tail: &str, run: usize, out: &mut String) -> usize {
    out.push_str(&tail[..run]);
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_highlight() {
        assert_eq!(transform_inline("==hi there=="), "<mark>hi there</mark>");
        assert_eq!(transform_inline("== spaced=="), "== spaced==");
        assert_eq!(transform_inline("a == b"), "a == b");
        assert_eq!(transform_inline("==a ^b^=="), "<mark>a <sup>b</sup></mark>");
    }

    #[test]
    fn test_setext_underline_untouched() {
        assert_eq!(transform_inline("Title\n=====\n"), "Title\n=====\n");
        assert_eq!(transform_inline("a === b === c"), "a === b === c");
    }

    #[test]
    fn test_highlight_does_not_cross_lines() {
        assert_eq!(transform_inline("==a\nb=="), "==a\nb==");
    }

    #[test]
    fn test_superscript_and_subscript() {
        assert_eq!(transform_inline("x^2^"), "x<sup>2</sup>");
        assert_eq!(transform_inline("H~2~O"), "H<sub>2</sub>O");
        assert_eq!(transform_inline("a ^b c^"), "a ^b c^");
        assert_eq!(transform_inline("~ a~"), "~ a~");
    }

    #[test]
    fn test_strikethrough_not_subscript() {
        assert_eq!(transform_inline("~~gone~~"), "~~gone~~");
        assert_eq!(transform_inline("~a~~"), "~a~~");
    }

    #[test]
    fn test_attributed_image() {
        assert_eq!(
            transform_inline("![Cat](cat.png){width:50, caption:A cat, sitting}"),
            r#"<figure class="image align-center" style="width:50%"><img src="cat.png" alt="Cat"><figcaption>A cat, sitting</figcaption></figure>"#
        );
        assert_eq!(
            transform_inline("![x](y.png){align:left, width:200px}"),
            r#"<figure class="image align-left" style="width:200px"><img src="y.png" alt="x"></figure>"#
        );
    }

    #[test]
    fn test_plain_image_unchanged() {
        assert_eq!(transform_inline("![a](b.png)"), "![a](b.png)");
    }

    #[test]
    fn test_titled_link() {
        assert_eq!(
            transform_inline(r#"[Docs](https://x.dev "The docs")"#),
            r#"<a href="https://x.dev" title="The docs">Docs</a>"#
        );
    }

    #[test]
    fn test_icon_link() {
        assert_eq!(
            transform_inline("[GitHub](https://github.com){github}"),
            r#"<a href="https://github.com" class="icon-link" data-icon="github"><span class="icon icon-github" aria-hidden="true"></span>GitHub</a>"#
        );
    }

    #[test]
    fn test_titled_link_is_not_icon_link() {
        assert_eq!(
            transform_inline(r#"[a](b "t"){icon}"#),
            r#"<a href="b" title="t">a</a>{icon}"#
        );
    }

    #[test]
    fn test_plain_link_text_transformed() {
        assert_eq!(
            transform_inline("[==a==](https://x/a^b^c)"),
            "[<mark>a</mark>](https://x/a^b^c)"
        );
    }

    #[test]
    fn test_image_inside_link_text() {
        assert_eq!(
            transform_inline("[![i](i.png){width:10}](/home)"),
            r#"[<figure class="image align-center" style="width:10%"><img src="i.png" alt="i"></figure>](/home)"#
        );
    }

    #[test]
    fn test_html_and_escapes_skipped() {
        assert_eq!(
            transform_inline(r#"<span title="==x==">y</span>"#),
            r#"<span title="==x==">y</span>"#
        );
        assert_eq!(transform_inline(r"\==x=="), r"\==x==");
        assert_eq!(transform_inline("a < b ==c=="), "a < b <mark>c</mark>");
    }

    #[test]
    fn test_attribute_values_escaped() {
        let html = transform_inline(r#"![a"b](x.png){caption:<b>}"#);
        assert!(html.contains(r#"alt="a&quot;b""#));
        assert!(html.contains("<figcaption>&lt;b&gt;</figcaption>"));
    }

    #[test]
    fn test_transform_is_idempotent() {
        let input = "==a== ^b^ ~c~ ![d](e){width:5} [f](g \"h\") [i](j){k} [l](m)";
        let once = transform_inline(input);
        assert_eq!(transform_inline(&once), once);
    }

    #[test]
    fn test_placeholder_copied() {
        let protected = crate::protect::protect("`==x==` ==y==");
        let out = transform_inline(&protected.masked);
        assert_eq!(protected.restore(&out), "`==x==` <mark>y</mark>");
    }
}
