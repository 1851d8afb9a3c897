//! Tab groups with lazily realized panes.
//!
//! Only the active pane is rendered up front. The others keep their source
//! and are emitted hidden, carrying the percent-encoded source so a client
//! can ask for them later; [`crate::Pipeline::activate_pane`] realizes one on
//! the server side. A realized pane keeps its content for good.

use std::fmt::Write;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use crate::block::{Block, BlockBody};
use crate::pipeline::{Pipeline, RenderContext, TabsMode};
use crate::state::escape_html;

/// One tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pane {
    pub label: String,
    /// Markdown source of the pane.
    pub source: String,
    /// Rendered content, once realized.
    pub content: Option<String>,
}

impl Pane {
    #[must_use]
    pub fn is_realized(&self) -> bool {
        self.content.is_some()
    }
}

/// A `:::tabs` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabsView {
    /// Page-unique group id.
    pub id: usize,
    pub panes: Vec<Pane>,
    /// Index of the visible pane.
    pub active: usize,
}

pub(crate) fn build(
    block: &Block,
    pipeline: &Pipeline,
    ctx: &mut RenderContext,
) -> Result<TabsView, String> {
    let BlockBody::Tabs(tabs) = &block.body else {
        return Err("Tabs block has no @tab sections".to_owned());
    };
    if tabs.is_empty() {
        return Err("Tabs block has no @tab sections".to_owned());
    }

    // Nested groups cannot be activated later, so they are realized whole.
    let eager = pipeline.options().tabs == TabsMode::Eager || ctx.depth() > 0;
    let mut view = TabsView {
        id: ctx.next_tabs_id(),
        panes: tabs
            .iter()
            .map(|tab| Pane {
                label: tab.label.clone(),
                source: tab.content.clone(),
                content: None,
            })
            .collect(),
        active: 0,
    };
    for index in 0..view.panes.len() {
        if index == view.active || eager {
            view.realize(index, pipeline, ctx);
        }
    }
    Ok(view)
}

impl TabsView {
    /// Render pane `index` if it has not been rendered yet.
    pub(crate) fn realize(&mut self, index: usize, pipeline: &Pipeline, ctx: &mut RenderContext) {
        let Some(pane) = self.panes.get_mut(index) else {
            return;
        };
        if pane.content.is_none() {
            tracing::debug!(group = self.id, pane = index, "realizing tab pane");
            pane.content = Some(pipeline.render_fragment(&pane.source, ctx));
        }
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        let id = self.id;
        let mut out = format!(
            r#"<div class="tabs" id="tabs-{id}"><div class="tabs-buttons" role="tablist">"#
        );
        for (index, pane) in self.panes.iter().enumerate() {
            let selected = index == self.active;
            let _ = write!(
                out,
                r#"<button role="tab" id="tab-{id}-{index}" aria-controls="panel-{id}-{index}" aria-selected="{selected}" tabindex="{}">{}</button>"#,
                if selected { "0" } else { "-1" },
                escape_html(&pane.label)
            );
        }
        out.push_str("</div>");

        for (index, pane) in self.panes.iter().enumerate() {
            let _ = write!(
                out,
                r#"<div class="tab-panel" role="tabpanel" id="panel-{id}-{index}" aria-labelledby="tab-{id}-{index}""#
            );
            if index != self.active {
                out.push_str(" hidden");
            }
            match &pane.content {
                Some(content) => {
                    let _ = write!(out, ">{content}</div>");
                }
                None => {
                    let _ = write!(
                        out,
                        r#" data-lumen-pending="{}"></div>"#,
                        utf8_percent_encode(&pane.source, NON_ALPHANUMERIC)
                    );
                }
            }
        }
        out.push_str("</div>");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttributeSet;
    use crate::block::{BlockKind, Tab};
    use crate::pipeline::PipelineOptions;

    fn tabs_block(panes: &[(&str, &str)]) -> Block {
        Block::new(
            BlockKind::Tabs,
            AttributeSet::new(),
            BlockBody::Tabs(
                panes
                    .iter()
                    .map(|(label, content)| Tab {
                        label: (*label).to_owned(),
                        content: (*content).to_owned(),
                    })
                    .collect(),
            ),
        )
    }

    #[test]
    fn test_only_first_pane_realized() {
        let pipeline = Pipeline::new(PipelineOptions::default());
        let mut ctx = RenderContext::new();
        let view = build(&tabs_block(&[("A", "one"), ("B", "two")]), &pipeline, &mut ctx).unwrap();
        assert_eq!(view.panes[0].content.as_deref(), Some("<p>one</p>"));
        assert!(!view.panes[1].is_realized());

        let html = view.to_html();
        assert!(html.contains(r#"aria-selected="true" tabindex="0">A</button>"#));
        assert!(html.contains(r#"aria-selected="false" tabindex="-1">B</button>"#));
        assert!(html.contains(r#"aria-labelledby="tab-0-1" hidden data-lumen-pending="two"></div>"#));
    }

    #[test]
    fn test_eager_mode_realizes_all() {
        let options = PipelineOptions {
            tabs: TabsMode::Eager,
            ..PipelineOptions::default()
        };
        let pipeline = Pipeline::new(options);
        let mut ctx = RenderContext::new();
        let view = build(&tabs_block(&[("A", "one"), ("B", "two")]), &pipeline, &mut ctx).unwrap();
        assert!(view.panes.iter().all(Pane::is_realized));
        assert!(view.to_html().contains(r#"hidden><p>two</p></div>"#));
    }

    #[test]
    fn test_group_ids_are_unique() {
        let pipeline = Pipeline::new(PipelineOptions::default());
        let mut ctx = RenderContext::new();
        let first = build(&tabs_block(&[("A", "a")]), &pipeline, &mut ctx).unwrap();
        let second = build(&tabs_block(&[("A", "a")]), &pipeline, &mut ctx).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_realize_keeps_content() {
        let pipeline = Pipeline::new(PipelineOptions::default());
        let mut ctx = RenderContext::new();
        let mut view =
            build(&tabs_block(&[("A", "a"), ("B", "**b**")]), &pipeline, &mut ctx).unwrap();
        view.realize(1, &pipeline, &mut ctx);
        assert_eq!(view.panes[1].content.as_deref(), Some("<p><strong>b</strong></p>"));

        view.panes[1].source = "changed".to_owned();
        view.realize(1, &pipeline, &mut ctx);
        assert_eq!(view.panes[1].content.as_deref(), Some("<p><strong>b</strong></p>"));
    }

    #[test]
    fn test_empty_tabs_is_error() {
        let pipeline = Pipeline::new(PipelineOptions::default());
        let result = build(&tabs_block(&[]), &pipeline, &mut RenderContext::new());
        assert!(result.is_err());
    }
}
