//! Markdown rendering with a fixed set of document extensions.
//!
//! On top of pulldown-cmark this crate understands fenced extension blocks
//! (`:::alert`, `:::tabs`, `:::timeline`, `:::chat`, `:::link-card`,
//! `:::chart`, `:::video`) and a handful of inline forms (`==mark==`,
//! `^sup^`, `~sub~`, attributed images, titled and icon links).
//!
//! # Architecture
//!
//! Rendering a document goes through [`Pipeline`]:
//!
//! 1. [`protect`] masks code so nothing below rewrites it.
//! 2. [`extract_blocks`] replaces each extension block with a carrier element
//!    holding the whole [`Block`], percent-encoded.
//! 3. [`transform_inline`] rewrites the inline forms to HTML.
//! 4. [`reindent_nested_lists`] normalizes nested ordered lists and the code
//!    is restored; [`scan_ordered_lists`] then records every item number from
//!    the same parse the renderer runs.
//! 5. [`MarkdownRenderer`] renders the markdown, lifting carriers out of the
//!    HTML as it goes.
//! 6. [`renumber_list_items`] writes the author's numbers onto list items.
//! 7. [`dispatch`] turns each carrier into a [`ContentBlock`], rendering
//!    nested documents through the same pipeline.
//!
//! # Example
//!
//! ```
//! use lumen_renderer::{Pipeline, PipelineOptions};
//!
//! let source = ":::tabs\n@tab Rust\n`cargo build`\n@tab Shell\n`make`\n:::";
//! let rendered = Pipeline::new(PipelineOptions::default()).render(source);
//! assert!(rendered.html.contains(r#"role="tablist""#));
//! assert!(rendered.warnings.is_empty());
//! ```

mod attrs;
mod backend;
mod block;
mod carrier;
pub mod dispatch;
mod extract;
mod fence;
mod html;
mod inline;
mod lists;
mod pipeline;
mod protect;
mod renderer;
mod state;
mod util;

pub use attrs::AttributeSet;
pub use backend::{AlertKind, RenderBackend};
pub use block::{Block, BlockBody, BlockKind, ChatMessage, Person, Tab, TimelineItem};
pub use carrier::{Carrier, PayloadError, carrier_html, decode_payload, encode_payload};
pub use dispatch::{ContentBlock, dispatch};
pub use extract::{DEFAULT_MINECRAFT_AVATAR_URL, ExtractOptions, Extracted, extract_blocks};
pub use html::HtmlBackend;
pub use inline::transform_inline;
pub use lists::{
    OrderedListEntry, renumber_list_items, reindent_nested_lists, scan_ordered_lists,
};
pub use pipeline::{
    MEMO_CAPACITY, Pipeline, PipelineOptions, Preprocessed, RenderContext, Rendered, TabsMode,
};
pub use protect::{Protected, ProtectedSpan, protect, restore};
pub use renderer::{MarkdownRenderer, RenderResult, block_placeholder};
pub use state::{HeadingIds, TocEntry, escape_html};
