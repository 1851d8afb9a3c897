//! Container header and closing-fence recognition.

use crate::util::leading_whitespace;

/// A parsed `:::name{attrs}` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Header<'a> {
    /// Indentation before the colons.
    pub(crate) indent: &'a str,
    pub(crate) name: &'a str,
    /// Text between the braces, without them.
    pub(crate) attrs: &'a str,
    /// Body of the single-line form `:::name{..}body:::`.
    pub(crate) inline_body: Option<&'a str>,
}

/// Parse a container header.
///
/// Three or more colons, a name, an optional brace group, then either nothing
/// (multi-line form) or a body followed by three or more colons (single-line
/// form). Anything else is not a header.
pub(crate) fn parse_header(line: &str) -> Option<Header<'_>> {
    let content = line.trim_end_matches(['\n', '\r']);
    let indent = leading_whitespace(content);
    let trimmed = content[indent.len()..].trim_end();

    let colons = trimmed.chars().take_while(|&c| c == ':').count();
    if colons < 3 {
        return None;
    }

    let after = trimmed[colons..].trim_start();
    let name_end = after
        .find(|c: char| !is_name_char(c))
        .unwrap_or(after.len());
    let name = &after[..name_end];
    if name.is_empty() {
        return None;
    }

    let mut rest = &after[name_end..];
    let mut attrs = "";
    if rest.starts_with('{') {
        let (inner, consumed) = parse_braces(rest)?;
        attrs = inner;
        rest = &rest[consumed..];
    }

    let rest = rest.trim();
    if rest.is_empty() {
        return Some(Header {
            indent,
            name,
            attrs,
            inline_body: None,
        });
    }

    let closing = rest.chars().rev().take_while(|&c| c == ':').count();
    if closing < 3 {
        return None;
    }
    Some(Header {
        indent,
        name,
        attrs,
        inline_body: Some(rest[..rest.len() - closing].trim()),
    })
}

/// A line made only of three or more colons.
pub(crate) fn is_closing_fence(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|c| c == ':')
}

/// Whether `line` opens a multi-line container of any name.
pub(crate) fn opens_container(line: &str) -> bool {
    parse_header(line).is_some_and(|h| h.inline_body.is_none())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Parse a brace group: `{...}`, nesting and quoted values respected.
///
/// A quote only opens a quoted value right after `key:`, so apostrophes in
/// bare text do not swallow the closing brace.
///
/// Returns (inner text, bytes consumed), or `None` if the group never closes.
fn parse_braces(s: &str) -> Option<(&str, usize)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev = ' ';

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if !c.is_whitespace() {
            let after_colon = prev == ':';
            prev = c;
            if (c == '"' || c == '\'') && depth > 0 && after_colon {
                quote = Some(c);
                continue;
            }
        }
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some((&s[1..i], i + 1));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_line_header() {
        let header = parse_header(":::alert{type:warning}\n").unwrap();
        assert_eq!(header.name, "alert");
        assert_eq!(header.attrs, "type:warning");
        assert_eq!(header.inline_body, None);
        assert_eq!(header.indent, "");
    }

    #[test]
    fn test_header_without_braces_and_indent() {
        let header = parse_header("   ::::tabs  \n").unwrap();
        assert_eq!(header.name, "tabs");
        assert_eq!(header.attrs, "");
        assert_eq!(header.indent, "   ");
    }

    #[test]
    fn test_single_line_header() {
        let header = parse_header(":::alert{}content:::").unwrap();
        assert_eq!(header.name, "alert");
        assert_eq!(header.inline_body, Some("content"));

        let header = parse_header(":::link-card{url:https://x.y} A site :::").unwrap();
        assert_eq!(header.attrs, "url:https://x.y");
        assert_eq!(header.inline_body, Some("A site"));
    }

    #[test]
    fn test_quoted_brace_inside_attrs() {
        let header = parse_header(r#":::alert{title:"a } b"}"#).unwrap();
        assert_eq!(header.attrs, r#"title:"a } b""#);
    }

    #[test]
    fn test_apostrophe_in_bare_value() {
        let header = parse_header(":::alert{title:Don't panic}body:::").unwrap();
        assert_eq!(header.attrs, "title:Don't panic");
        assert_eq!(header.inline_body, Some("body"));
    }

    #[test]
    fn test_not_headers() {
        assert_eq!(parse_header(":::"), None);
        assert_eq!(parse_header("::alert"), None);
        assert_eq!(parse_header(":::alert{unclosed"), None);
        assert_eq!(parse_header(":::alert{} trailing text"), None);
        assert_eq!(parse_header("text :::alert"), None);
    }

    #[test]
    fn test_closing_fence() {
        assert!(is_closing_fence(":::"));
        assert!(is_closing_fence("  ::::  \n"));
        assert!(!is_closing_fence("::"));
        assert!(!is_closing_fence(":::alert"));
    }

    #[test]
    fn test_opens_container() {
        assert!(opens_container(":::tabs"));
        assert!(opens_container(":::unknown{}"));
        assert!(!opens_container(":::alert{}x:::"));
        assert!(!opens_container(":::"));
    }
}
