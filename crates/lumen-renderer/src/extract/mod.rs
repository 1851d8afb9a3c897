//! Block extraction.
//!
//! One pass over the span-protected document, line by line. A header line
//! (`:::kind{attrs}`) starts a block; the matching closing fence is found by
//! counting nested headers, so an inner block never ends its parent early and
//! no kind has to be tried before another. Each recognized block is replaced
//! by a carrier element (see [`crate::carrier`]). Bodies are not processed
//! here; they are rendered as nested documents at dispatch time.
//!
//! Unknown kinds, unclosed blocks and link cards without a `url` stay in the
//! document as literal text.

mod body;
mod header;

use std::sync::LazyLock;

use regex::Regex;

use crate::attrs::AttributeSet;
use crate::block::{Block, BlockBody, BlockKind, ChatMessage, Person, Tab, TimelineItem};
use crate::carrier::carrier_html;
use crate::protect::{ProtectedSpan, restore};
use crate::util::{dedent, indent_width, strip_quotes, trim_blank_lines};

use body::split_sections;
use header::{is_closing_fence, opens_container, parse_header};

/// Default avatar service for `avatar:minecraft`.
pub const DEFAULT_MINECRAFT_AVATAR_URL: &str = "https://mc-heads.net/avatar/{name}";

/// Timeline headers starting with a year are dates.
static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}\b").expect("invalid year regex"));

/// Player names accepted for derived avatars.
static PLAYER_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,16}$").expect("invalid player name regex"));

/// Settings that influence extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// URL template for `avatar:minecraft`; `{name}` is replaced.
    pub minecraft_avatar_url: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            minecraft_avatar_url: DEFAULT_MINECRAFT_AVATAR_URL.to_owned(),
        }
    }
}

/// Output of [`extract_blocks`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    /// Document with blocks replaced by carriers. Still masked.
    pub text: String,
    /// Number of carriers emitted.
    pub blocks: usize,
    /// Blocks that were left as text, and why.
    pub warnings: Vec<String>,
}

/// Replace every extension block in `masked` with its carrier.
///
/// `spans` are the protected spans of `masked`; block bodies and attributes
/// are restored before they are encoded, so payloads carry the author's text.
#[must_use]
pub fn extract_blocks(masked: &str, spans: &[ProtectedSpan], options: &ExtractOptions) -> Extracted {
    let mut extractor = Extractor {
        spans,
        options,
        out: String::with_capacity(masked.len()),
        blocks: 0,
        warnings: Vec::new(),
    };
    extractor.run(masked);
    Extracted {
        text: extractor.out,
        blocks: extractor.blocks,
        warnings: extractor.warnings,
    }
}

struct Extractor<'a> {
    spans: &'a [ProtectedSpan],
    options: &'a ExtractOptions,
    out: String,
    blocks: usize,
    warnings: Vec<String>,
}

impl Extractor<'_> {
    fn run(&mut self, text: &str) {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let mut i = 0;

        while i < lines.len() {
            match self.try_block(&lines, i) {
                Some(next) => i = next,
                None => {
                    self.out.push_str(lines[i]);
                    i += 1;
                }
            }
        }
    }

    /// Try to extract a block starting at `lines[i]`.
    ///
    /// Returns the index of the first line after the consumed region, or `None`
    /// if `lines[i]` does not start an extractable block.
    fn try_block(&mut self, lines: &[&str], i: usize) -> Option<usize> {
        let header = parse_header(lines[i])?;
        let kind = BlockKind::from_name(header.name)?;

        let (raw_body, next) = match header.inline_body {
            Some(body) if kind.allows_single_line() => (body.to_owned(), i + 1),
            Some(_) => return None,
            None => {
                let close = find_close(lines, i)?;
                let body = lines[i + 1..close].concat();
                (dedent(&body, indent_width(header.indent)), close + 1)
            }
        };

        let attributes = AttributeSet::parse(&restore(header.attrs, self.spans));
        let Some(body) = self.build_body(kind, &attributes, &raw_body) else {
            // Abandoned: the whole region stays exactly as written.
            for line in &lines[i..next] {
                self.out.push_str(line);
            }
            return Some(next);
        };

        let block = Block::new(kind, attributes, body);
        match carrier_html(&block) {
            Ok(carrier) => {
                self.push_carrier(header.indent, &carrier);
                self.blocks += 1;
                Some(next)
            }
            Err(e) => {
                tracing::warn!(kind = kind.name(), error = %e, "cannot encode block");
                self.warnings
                    .push(format!("{} block could not be encoded: {e}", kind.name()));
                None
            }
        }
    }

    fn build_body(&mut self, kind: BlockKind, attrs: &AttributeSet, raw: &str) -> Option<BlockBody> {
        let body = match kind {
            BlockKind::LinkCard if attrs.get_non_empty("url").is_none() => {
                tracing::warn!("link-card without url left as text");
                self.warnings
                    .push("link-card block has no url attribute; left as text".to_owned());
                return None;
            }
            BlockKind::Alert | BlockKind::Video | BlockKind::Chart | BlockKind::LinkCard => {
                BlockBody::Document(self.document(raw))
            }
            BlockKind::Tabs => BlockBody::Tabs(
                split_sections(raw, "@tab")
                    .into_iter()
                    .enumerate()
                    .map(|(index, section)| {
                        let label = self.restore(&section.header);
                        let label = strip_quotes(label.trim()).trim();
                        Tab {
                            label: if label.is_empty() {
                                format!("Tab {}", index + 1)
                            } else {
                                label.to_owned()
                            },
                            content: self.document(&section.content),
                        }
                    })
                    .collect(),
            ),
            BlockKind::Timeline => BlockBody::Timeline(
                split_sections(raw, "@item")
                    .into_iter()
                    .map(|section| {
                        let (date, title) = parse_item_header(&self.restore(&section.header));
                        TimelineItem {
                            date,
                            title,
                            content: self.document(&section.content),
                        }
                    })
                    .collect(),
            ),
            BlockKind::Chat => BlockBody::Chat(
                split_sections(raw, "@person")
                    .into_iter()
                    .map(|section| ChatMessage {
                        person: self.person(&section.header),
                        content: self.document(&section.content),
                    })
                    .collect(),
            ),
        };
        Some(body)
    }

    fn restore(&self, text: &str) -> String {
        restore(text, self.spans)
    }

    /// Restore a body and drop its surrounding blank lines.
    fn document(&self, raw: &str) -> String {
        trim_blank_lines(&self.restore(raw)).to_owned()
    }

    fn person(&self, header: &str) -> Person {
        let attrs = AttributeSet::parse(&self.restore(header));
        let name = attrs.get_or("name", "Anonymous").trim().to_owned();
        let avatar = match attrs.get_non_empty("avatar") {
            Some("minecraft") => minecraft_avatar(&self.options.minecraft_avatar_url, &name),
            Some(url) => Some(url.trim().to_owned()),
            None => None,
        };
        Person { name, avatar }
    }

    fn push_carrier(&mut self, indent: &str, carrier: &str) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push_str(if self.out.ends_with('\n') { "\n" } else { "\n\n" });
        }
        self.out.push_str(indent);
        self.out.push_str(carrier);
        self.out.push_str("\n\n");
    }
}

/// Index of the fence closing the block opened at `lines[open]`.
fn find_close(lines: &[&str], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, line) in lines[open + 1..].iter().enumerate() {
        if is_closing_fence(line) {
            if depth == 0 {
                return Some(open + 1 + offset);
            }
            depth -= 1;
        } else if opens_container(line) {
            depth += 1;
        }
    }
    None
}

/// Split a timeline header into (date, title).
///
/// `date | title` with either side optional; without a bar, a leading
/// four-digit year makes the whole header a date, otherwise it is a title.
fn parse_item_header(header: &str) -> (Option<String>, Option<String>) {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_owned())
    };
    match header.split_once('|') {
        Some((date, title)) => (non_empty(date), non_empty(title)),
        None if YEAR_PATTERN.is_match(header.trim()) => (non_empty(header), None),
        None => (None, non_empty(header)),
    }
}

/// Derived avatar URL for a player name, if the name is valid.
fn minecraft_avatar(template: &str, name: &str) -> Option<String> {
    PLAYER_NAME_PATTERN
        .is_match(name)
        .then(|| template.replace("{name}", name))
}
