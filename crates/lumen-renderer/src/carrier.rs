//! Carrier elements.
//!
//! Each extracted block travels through the markdown renderer as one empty
//! `<div>` whose marker attribute names the kind and whose payload attribute
//! holds the whole [`Block`] as JSON, percent-encoded as a unit. Every byte
//! other than ASCII letters and digits is escaped, so the payload contains no
//! markup, no quotes and no extension syntax.

use std::ops::Range;
use std::sync::LazyLock;

use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;

use crate::block::Block;

/// Marker attribute naming the block kind.
pub const BLOCK_ATTR: &str = "data-lumen-block";
/// Attribute holding the encoded payload.
pub const PAYLOAD_ATTR: &str = "data-lumen-payload";

static CARRIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div\s+data-lumen-block="([^"]*)"\s+data-lumen-payload="([^"]*)"\s*>\s*</div>"#)
        .expect("invalid carrier regex")
});

/// Hand-written carriers matched by class name.
static LEGACY_CARRIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<div\s+class="lumen-block lumen-([a-z-]+)"\s+data-(?:lumen-)?payload="([^"]*)"\s*>\s*</div>"#,
    )
    .expect("invalid legacy carrier regex")
});

/// Payload decoding failure.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Percent-decoded bytes are not UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// Decoded text is not a serialized block.
    #[error("payload is not a valid block: {0}")]
    Json(#[from] serde_json::Error),
    /// The payload describes a different kind than the carrier claims.
    #[error("carrier says `{carrier}` but payload holds `{payload}`")]
    KindMismatch {
        /// Kind from the marker attribute.
        carrier: String,
        /// Kind inside the payload.
        payload: String,
    },
}

/// Serialize and percent-encode a block.
pub fn encode_payload(block: &Block) -> Result<String, PayloadError> {
    let json = serde_json::to_string(block)?;
    Ok(utf8_percent_encode(&json, NON_ALPHANUMERIC).to_string())
}

/// Percent-decode and deserialize a block.
pub fn decode_payload(payload: &str) -> Result<Block, PayloadError> {
    let decoded = percent_decode_str(payload).decode_utf8()?;
    Ok(serde_json::from_str(&decoded)?)
}

/// The carrier element for a block.
pub fn carrier_html(block: &Block) -> Result<String, PayloadError> {
    Ok(format!(
        r#"<div {BLOCK_ATTR}="{}" {PAYLOAD_ATTR}="{}"></div>"#,
        block.kind.name(),
        encode_payload(block)?
    ))
}

/// A carrier found in rendered HTML, not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carrier {
    /// Kind named by the element (may be unknown).
    pub kind: String,
    /// Encoded payload.
    pub payload: String,
    /// Matched through the class-name fallback.
    pub legacy: bool,
}

impl Carrier {
    /// Decode the payload, checking it agrees with the carrier's kind.
    pub fn decode(&self) -> Result<Block, PayloadError> {
        let block = decode_payload(&self.payload)?;
        if block.kind.name() != self.kind {
            return Err(PayloadError::KindMismatch {
                carrier: self.kind.clone(),
                payload: block.kind.name().to_owned(),
            });
        }
        Ok(block)
    }
}

/// Find carrier elements in an HTML fragment, in document order.
pub(crate) fn find_carriers(html: &str) -> Vec<(Range<usize>, Carrier)> {
    let mut found: Vec<(Range<usize>, Carrier)> = CARRIER_PATTERN
        .captures_iter(html)
        .filter_map(|caps| {
            let range = caps.get(0)?.range();
            Some((
                range,
                Carrier {
                    kind: caps[1].to_owned(),
                    payload: caps[2].to_owned(),
                    legacy: false,
                },
            ))
        })
        .collect();

    if html.contains("lumen-block lumen-") {
        for caps in LEGACY_CARRIER_PATTERN.captures_iter(html) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            tracing::debug!(kind = &caps[1], "matched carrier by class name");
            found.push((
                whole.range(),
                Carrier {
                    kind: caps[1].to_owned(),
                    payload: caps[2].to_owned(),
                    legacy: true,
                },
            ));
        }
        found.sort_by_key(|(range, _)| range.start);
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttributeSet;
    use crate::block::{BlockBody, BlockKind, ChatMessage, Person};

    fn sample() -> Block {
        Block::new(
            BlockKind::Chat,
            AttributeSet::parse(r#"title:"Quotes, commas""#),
            BlockBody::Chat(vec![ChatMessage {
                person: Person {
                    name: "Zoë".to_owned(),
                    avatar: None,
                },
                content: "He said \"hi\", then left.\nÜber 東京 ✓\n".to_owned(),
            }]),
        )
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let block = sample();
        let encoded = encode_payload(&block).unwrap();
        assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric() || c == '%'));
        assert_eq!(decode_payload(&encoded).unwrap(), block);
    }

    #[test]
    fn test_carrier_survives_html_search() {
        let block = sample();
        let html = format!("<p>a</p>\n{}\n<p>b</p>", carrier_html(&block).unwrap());
        let found = find_carriers(&html);
        assert_eq!(found.len(), 1);
        let (range, carrier) = &found[0];
        assert_eq!(carrier.kind, "chat");
        assert!(!carrier.legacy);
        assert!(html[range.clone()].starts_with("<div data-lumen-block"));
        assert_eq!(carrier.decode().unwrap(), block);
    }

    #[test]
    fn test_decode_rejects_bad_utf8() {
        let err = decode_payload("%FF%FE").unwrap_err();
        assert!(matches!(err, PayloadError::Utf8(_)));
    }

    #[test]
    fn test_decode_rejects_bad_json() {
        let err = decode_payload("not%20json").unwrap_err();
        assert!(matches!(err, PayloadError::Json(_)));
    }

    #[test]
    fn test_kind_mismatch() {
        let carrier = Carrier {
            kind: "alert".to_owned(),
            payload: encode_payload(&sample()).unwrap(),
            legacy: false,
        };
        assert!(matches!(
            carrier.decode(),
            Err(PayloadError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_legacy_class_carrier() {
        let block = Block::new(
            BlockKind::Alert,
            AttributeSet::new(),
            BlockBody::Document("hi".to_owned()),
        );
        let payload = encode_payload(&block).unwrap();
        let html = format!(
            r#"<div class="lumen-block lumen-alert" data-payload="{payload}"></div><div data-lumen-block="alert" data-lumen-payload="{payload}"></div>"#
        );
        let found = find_carriers(&html);
        assert_eq!(found.len(), 2);
        assert!(found[0].1.legacy);
        assert!(!found[1].1.legacy);
        assert_eq!(found[0].1.decode().unwrap(), block);
    }
}
