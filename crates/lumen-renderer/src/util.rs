//! Shared text helpers.

use pulldown_cmark::HeadingLevel;

/// Columns a tab advances to (next multiple of four).
const TAB_STOP: usize = 4;

/// Convert heading level enum to number (1-6).
#[must_use]
pub(crate) fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Visual width of a line's leading whitespace, expanding tabs.
pub(crate) fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += TAB_STOP - width % TAB_STOP,
            _ => break,
        }
    }
    width
}

/// Leading whitespace of a line (spaces and tabs only).
pub(crate) fn leading_whitespace(line: &str) -> &str {
    let end = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..end]
}

/// Strip surrounding quotes (single or double) from a string.
pub(crate) fn strip_quotes(s: &str) -> &str {
    let is_quoted =
        (s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\''));
    if is_quoted && s.len() >= 2 {
        return &s[1..s.len() - 1];
    }
    s
}

/// Drop leading and trailing blank lines, keeping inner indentation.
pub(crate) fn trim_blank_lines(text: &str) -> &str {
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    let rest = &text[start..];
    let end = rest.trim_end().len();
    &rest[..end]
}

/// Remove up to `width` columns of indentation from every line.
pub(crate) fn dedent(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let mut removed = 0;
        let mut cut = 0;
        for (i, c) in line.char_indices() {
            if removed >= width {
                break;
            }
            match c {
                ' ' => removed += 1,
                '\t' => removed += TAB_STOP - removed % TAB_STOP,
                _ => break,
            }
            cut = i + 1;
        }
        out.push_str(&line[cut..]);
    }
    out
}

/// Width attribute as CSS: a bare number is a percentage.
pub(crate) fn css_width(width: &str) -> String {
    let width = width.trim();
    let bare = !width.is_empty()
        && width.chars().all(|c| c.is_ascii_digit() || c == '.')
        && width.chars().filter(|&c| c == '.').count() <= 1;
    if bare {
        format!("{width}%")
    } else {
        width.to_owned()
    }
}
