//! Attribute lists of extension headers.
//!
//! Parses the text inside `:::kind{...}` (and `![..](..){...}`) braces:
//! `key:value` pairs separated by commas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attributes whose bare value may contain commas.
///
/// Their value runs up to the next `, <known key>:` rather than the next comma.
const FREE_TEXT_KEYS: &[&str] = &["caption", "description"];

/// Keys recognized as the end of a free-text value.
const KNOWN_KEYS: &[&str] = &[
    "align",
    "autoplay",
    "avatar",
    "caption",
    "controls",
    "description",
    "height",
    "icon",
    "image",
    "loop",
    "muted",
    "name",
    "src",
    "title",
    "type",
    "url",
    "width",
];

/// Parsed attribute list.
///
/// Keys are kept sorted, so two lists with the same pairs in a different order
/// compare equal. Unknown keys are kept; consumers ignore what they don't use.
///
/// # Grammar
///
/// ```text
/// list  := pair ("," pair)*
/// pair  := key ":" value | key
/// value := '"' ... '"' | "'" ... "'" | bare
/// ```
///
/// Quoted values may contain commas; a backslash escapes the quote character.
/// A key without a value is a flag and reads as `"true"`. Anything that does
/// not fit the grammar is skipped; parsing never fails.
///
/// # Example
///
/// ```
/// use lumen_renderer::AttributeSet;
///
/// let attrs = AttributeSet::parse(r#"type:warning, title:"Heads up, friend""#);
/// assert_eq!(attrs.get("type"), Some("warning"));
/// assert_eq!(attrs.get("title"), Some("Heads up, friend"));
/// assert_eq!(attrs.get_or("align", "center"), "center");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet(BTreeMap<String, String>);

impl AttributeSet {
    /// Create an empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the raw text between `{` and `}`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut attrs = Self::new();
        let mut rest = raw;

        loop {
            rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
            if rest.is_empty() {
                break;
            }

            let key_end = rest
                .find(|c: char| c == ':' || c == ',')
                .unwrap_or(rest.len());
            let key = rest[..key_end].trim();

            if !is_valid_key(key) {
                rest = skip_token(rest);
                continue;
            }
            let key = key.to_ascii_lowercase();

            if !rest[key_end..].starts_with(':') {
                attrs.insert(key, "true");
                rest = &rest[key_end..];
                continue;
            }

            let (value, remaining) = parse_value(&key, rest[key_end + 1..].trim_start());
            attrs.insert(key, value);
            rest = remaining;
        }

        attrs
    }

    /// Get an attribute value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Get an attribute value, treating empty values as missing.
    #[must_use]
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    /// Get an attribute value or a default.
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_non_empty(key).unwrap_or(default)
    }

    /// Read a boolean attribute.
    ///
    /// `true`/`yes`/`on`/`1` and `false`/`no`/`off`/`0` are recognized (case
    /// insensitive); anything else, including absence, gives `default`.
    #[must_use]
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("true" | "yes" | "on" | "1") => true,
            Some("false" | "no" | "off" | "0") => false,
            _ => default,
        }
    }

    /// Check whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Iterate over pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no attributes are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Skip a malformed token up to the next comma.
fn skip_token(s: &str) -> &str {
    match s.find(',') {
        Some(pos) => &s[pos + 1..],
        None => "",
    }
}

/// Parse a value. Returns the value and the unparsed remainder.
fn parse_value<'a>(key: &str, s: &'a str) -> (String, &'a str) {
    if let Some(quote) = s.chars().next().filter(|&c| c == '"' || c == '\'') {
        return parse_quoted(&s[1..], quote);
    }

    let end = if FREE_TEXT_KEYS.contains(&key) {
        free_text_end(s)
    } else {
        s.find(',').unwrap_or(s.len())
    };
    (s[..end].trim().to_owned(), &s[end..])
}

fn parse_quoted(s: &str, quote: char) -> (String, &str) {
    let mut value = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some((_, next)) if next == quote || next == '\\' => value.push(next),
                Some((_, next)) => {
                    value.push('\\');
                    value.push(next);
                }
                None => value.push('\\'),
            }
        } else if c == quote {
            return (value, &s[i + c.len_utf8()..]);
        } else {
            value.push(c);
        }
    }
    // Unterminated quote: take the rest.
    (value, "")
}

/// End of a free-text value: the comma that introduces the next known key.
fn free_text_end(s: &str) -> usize {
    let mut offset = 0;
    while let Some(pos) = s[offset..].find(',') {
        let comma = offset + pos;
        let after = s[comma + 1..].trim_start();
        let starts_key = KNOWN_KEYS.iter().any(|key| {
            after
                .strip_prefix(key)
                .is_some_and(|tail| tail.trim_start().starts_with(':'))
        });
        if starts_key {
            return comma;
        }
        offset = comma + 1;
    }
    s.len()
}
