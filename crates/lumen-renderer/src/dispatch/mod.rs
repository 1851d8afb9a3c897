//! Carrier dispatch.
//!
//! Turns each carrier lifted out of rendered HTML back into a typed
//! [`ContentBlock`]. Nested documents (alert bodies, tab panes, timeline
//! items, chat messages) go back through [`Pipeline::render_fragment`] with
//! the same [`RenderContext`], so they get every extension and share the
//! page's heading ids.
//!
//! Nothing here fails the surrounding render: a payload that cannot be
//! decoded renders nothing, and a block that decodes but cannot be shown
//! renders an inline error in its place.

mod alert;
mod media;
mod nested;
mod tabs;

use crate::block::BlockKind;
use crate::carrier::Carrier;
use crate::pipeline::{Pipeline, RenderContext};
use crate::state::escape_html;

pub use alert::AlertView;
pub use media::{ChartType, ChartView, LinkCardView, VideoView};
pub use nested::{ChatLine, ChatView, TimelineEntry, TimelineView};
pub use tabs::{Pane, TabsView};

/// A dispatched block, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Alert(AlertView),
    Chart(ChartView),
    Video(VideoView),
    Tabs(TabsView),
    Timeline(TimelineView),
    Chat(ChatView),
    LinkCard(LinkCardView),
    /// Visible inline error.
    Error(String),
    /// Renders nothing.
    Empty,
}

impl ContentBlock {
    /// Render the block.
    #[must_use]
    pub fn to_html(&self) -> String {
        match self {
            Self::Alert(view) => view.to_html(),
            Self::Chart(view) => view.to_html(),
            Self::Video(view) => view.to_html(),
            Self::Tabs(view) => view.to_html(),
            Self::Timeline(view) => view.to_html(),
            Self::Chat(view) => view.to_html(),
            Self::LinkCard(view) => view.to_html(),
            Self::Error(message) => format!(
                r#"<div class="lumen-error" role="alert">{}</div>"#,
                escape_html(message)
            ),
            Self::Empty => String::new(),
        }
    }

    /// Whether this is an inline error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Convert one carrier into its typed block.
pub fn dispatch(carrier: &Carrier, pipeline: &Pipeline, ctx: &mut RenderContext) -> ContentBlock {
    let Some(kind) = BlockKind::from_name(&carrier.kind) else {
        return error(ctx, format!("Unknown block type: {}", carrier.kind));
    };

    let block = match carrier.decode() {
        Ok(block) => block,
        Err(e) => {
            tracing::warn!(kind = %carrier.kind, error = %e, "cannot decode block payload");
            ctx.warn(format!("{} block dropped: {e}", carrier.kind));
            return ContentBlock::Empty;
        }
    };

    let result = match kind {
        BlockKind::Alert => Ok(ContentBlock::Alert(AlertView::build(&block, pipeline, ctx))),
        BlockKind::Chart => media::build_chart(&block).map(ContentBlock::Chart),
        BlockKind::Video => media::build_video(&block).map(ContentBlock::Video),
        BlockKind::LinkCard => {
            media::build_link_card(&block, pipeline, ctx).map(ContentBlock::LinkCard)
        },
        BlockKind::Tabs => tabs::build(&block, pipeline, ctx).map(ContentBlock::Tabs),
        BlockKind::Timeline => {
            nested::build_timeline(&block, pipeline, ctx).map(ContentBlock::Timeline)
        }
        BlockKind::Chat => nested::build_chat(&block, pipeline, ctx).map(ContentBlock::Chat),
    };

    result.unwrap_or_else(|message| error(ctx, message))
}

fn error(ctx: &mut RenderContext, message: String) -> ContentBlock {
    tracing::warn!(%message, "block rendered as error");
    ctx.warn(message.clone());
    ContentBlock::Error(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttributeSet;
    use crate::block::{Block, BlockBody};
    use crate::carrier::encode_payload;
    use crate::pipeline::PipelineOptions;

    fn carrier(kind: &str, payload: &str) -> Carrier {
        Carrier {
            kind: kind.to_owned(),
            payload: payload.to_owned(),
            legacy: false,
        }
    }

    #[test]
    fn test_unknown_kind_is_visible_error() {
        let pipeline = Pipeline::new(PipelineOptions::default());
        let mut ctx = RenderContext::new();
        let block = dispatch(&carrier("gallery", ""), &pipeline, &mut ctx);
        assert_eq!(block, ContentBlock::Error("Unknown block type: gallery".to_owned()));
        assert!(block.to_html().contains(r#"class="lumen-error""#));
        assert_eq!(ctx.warnings().len(), 1);
    }

    #[test]
    fn test_undecodable_payload_renders_nothing() {
        let pipeline = Pipeline::new(PipelineOptions::default());
        let mut ctx = RenderContext::new();
        let block = dispatch(&carrier("alert", "%FF%FE"), &pipeline, &mut ctx);
        assert_eq!(block, ContentBlock::Empty);
        assert_eq!(block.to_html(), "");
        assert_eq!(ctx.warnings().len(), 1);

        let block = dispatch(&carrier("alert", "not%20json"), &pipeline, &mut ctx);
        assert_eq!(block, ContentBlock::Empty);
    }

    #[test]
    fn test_kind_mismatch_renders_nothing() {
        let pipeline = Pipeline::new(PipelineOptions::default());
        let mut ctx = RenderContext::new();
        let video = Block::new(
            BlockKind::Video,
            AttributeSet::new(),
            BlockBody::Document("a.mp4".to_owned()),
        );
        let payload = encode_payload(&video).unwrap();
        let block = dispatch(&carrier("alert", &payload), &pipeline, &mut ctx);
        assert_eq!(block, ContentBlock::Empty);
    }

    #[test]
    fn test_error_message_escaped() {
        let html = ContentBlock::Error("bad <chart>".to_owned()).to_html();
        assert_eq!(
            html,
            r#"<div class="lumen-error" role="alert">bad &lt;chart&gt;</div>"#
        );
    }
}
