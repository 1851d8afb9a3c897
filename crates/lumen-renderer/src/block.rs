//! Extracted extension blocks.
//!
//! A [`Block`] is what the extractor carves out of a document and what crosses
//! the renderer inside a carrier element. Bodies hold raw source; nested
//! documents are rendered only at dispatch time.

use serde::{Deserialize, Serialize};

use crate::attrs::AttributeSet;

/// The closed set of block extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Alert,
    Tabs,
    Timeline,
    Chat,
    LinkCard,
    Chart,
    Video,
}

impl BlockKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Alert,
        Self::Tabs,
        Self::Timeline,
        Self::Chat,
        Self::LinkCard,
        Self::Chart,
        Self::Video,
    ];

    /// Name as written after `:::`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Tabs => "tabs",
            Self::Timeline => "timeline",
            Self::Chat => "chat",
            Self::LinkCard => "link-card",
            Self::Chart => "chart",
            Self::Video => "video",
        }
    }

    /// Look up a kind by its name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether `:::kind{..}body:::` on one line is accepted.
    #[must_use]
    pub fn allows_single_line(self) -> bool {
        matches!(self, Self::Alert | Self::Video | Self::LinkCard)
    }
}

/// An extracted block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "AttributeSet::is_empty")]
    pub attributes: AttributeSet,
    pub body: BlockBody,
}

impl Block {
    #[must_use]
    pub fn new(kind: BlockKind, attributes: AttributeSet, body: BlockBody) -> Self {
        Self {
            kind,
            attributes,
            body,
        }
    }
}

/// Block body, shaped by the block kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "value", rename_all = "kebab-case")]
pub enum BlockBody {
    /// A single nested document (alert, link-card, video) or raw data (chart).
    Document(String),
    /// Labelled panes.
    Tabs(Vec<Tab>),
    /// Dated or titled entries.
    Timeline(Vec<TimelineItem>),
    /// Messages with their speaker.
    Chat(Vec<ChatMessage>),
}

impl BlockBody {
    /// The single document, if this body has that shape.
    #[must_use]
    pub fn as_document(&self) -> Option<&str> {
        match self {
            Self::Document(text) => Some(text),
            _ => None,
        }
    }
}

/// One tab pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub label: String,
    pub content: String,
}

/// One timeline entry. Either side of the header may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
}

/// Chat participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub person: Person,
    pub content: String,
}
