use crate::HtmlBackend;
use crate::backend::{AlertKind, RenderBackend};
use crate::block::Block;
use crate::pipeline::{Pipeline, RenderContext};

/// A `:::alert` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertView {
    pub kind: AlertKind,
    /// Rendered inline title, if the block has one.
    pub title_html: Option<String>,
    /// Rendered body.
    pub content: String,
}

impl AlertView {
    pub(crate) fn build(block: &Block, pipeline: &Pipeline, ctx: &mut RenderContext) -> Self {
        let kind = AlertKind::from_attr(block.attributes.get("type"));
        let title_html = block
            .attributes
            .get_non_empty("title")
            .map(|title| pipeline.render_inline(title, ctx));
        let content = pipeline.render_fragment(block.body.as_document().unwrap_or_default(), ctx);
        Self {
            kind,
            title_html,
            content,
        }
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        HtmlBackend::alert_start(self.kind, self.title_html.as_deref(), &mut out);
        out.push_str(&self.content);
        HtmlBackend::alert_end(self.kind, &mut out);
        out
    }
}
