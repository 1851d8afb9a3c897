//! The rendering pipeline.
//!
//! [`Pipeline::render_with`] is the one reentrant entry point. It runs the
//! text stages ([`Pipeline::preprocess`]), renders the result with
//! pulldown-cmark, renumbers ordered lists and then dispatches every carrier.
//! Blocks that hold nested documents call back into the same pipeline with the
//! same [`RenderContext`].
//!
//! ```
//! use lumen_renderer::{Pipeline, PipelineOptions};
//!
//! let pipeline = Pipeline::new(PipelineOptions::default());
//! let rendered = pipeline.render(":::alert{type:warning}Mind the ==gap==:::");
//! assert!(rendered.html.contains(r#"class="alert alert-warning""#));
//! assert!(rendered.html.contains("<mark>gap</mark>"));
//! ```

use std::sync::LazyLock;

use lumen_cache::{Cache, CacheBucket, CacheBucketExt, MemoryCache, content_key};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::HtmlBackend;
use crate::dispatch::{ContentBlock, dispatch};
use crate::extract::{DEFAULT_MINECRAFT_AVATAR_URL, ExtractOptions, extract_blocks};
use crate::inline::transform_inline;
use crate::lists::{
    OrderedListEntry, renumber_list_items, reindent_nested_lists, scan_ordered_lists,
};
use crate::protect::protect;
use crate::renderer::MarkdownRenderer;
use crate::state::{HeadingIds, TocEntry};

static BLOCK_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x{E002}(\d+)\x{E003}").expect("invalid block placeholder regex")
});

/// Preprocessed documents kept by a pipeline created with [`Pipeline::new`].
pub const MEMO_CAPACITY: usize = 512;

/// How tab panes other than the active one are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabsMode {
    /// Render on activation.
    #[default]
    Lazy,
    /// Render every pane up front, for static output.
    Eager,
}

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// GitHub Flavored Markdown extensions.
    pub gfm: bool,
    /// Take the page title from the first H1 of the top-level document.
    pub extract_title: bool,
    /// Write the author's numbers onto ordered list items.
    pub renumber_lists: bool,
    /// Minimum indent of a nested ordered list below its parent.
    pub nesting_indent: usize,
    pub tabs: TabsMode,
    /// Avatar URL template for `avatar:minecraft`; `{name}` is replaced.
    pub minecraft_avatar_url: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            gfm: true,
            extract_title: false,
            renumber_lists: true,
            nesting_indent: 4,
            tabs: TabsMode::default(),
            minecraft_avatar_url: DEFAULT_MINECRAFT_AVATAR_URL.to_owned(),
        }
    }
}

/// Output of the text stages, ready for the markdown renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preprocessed {
    /// Markdown with every block replaced by its carrier.
    pub markdown: String,
    /// Ordered-list items as the author numbered them.
    pub list_entries: Vec<OrderedListEntry>,
    pub warnings: Vec<String>,
}

/// State shared by a document and every document nested in it.
///
/// Create one per page. Passing the same context to several renders keeps
/// heading ids and tab group ids unique across all of them.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    heading_ids: HeadingIds,
    next_tabs_id: usize,
    depth: usize,
    warnings: Vec<String>,
}

impl RenderContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem to report with the page.
    pub fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Nesting depth; 0 for the top-level document.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn next_tabs_id(&mut self) -> usize {
        let id = self.next_tabs_id;
        self.next_tabs_id += 1;
        id
    }
}

/// A rendered page.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub html: String,
    /// First H1, if title extraction is enabled.
    pub title: Option<String>,
    pub toc: Vec<TocEntry>,
    /// Top-level blocks in document order. Index `i` is the `i`th carrier.
    pub blocks: Vec<ContentBlock>,
    /// Problems found while rendering. None of them stopped the render.
    pub warnings: Vec<String>,
    /// `html` before splicing, with block placeholders.
    template: String,
    context: RenderContext,
}

/// One document rendered and spliced.
struct Realized {
    html: String,
    template: String,
    title: Option<String>,
    toc: Vec<TocEntry>,
    blocks: Vec<ContentBlock>,
}

/// Document renderer with the extension set.
pub struct Pipeline {
    options: PipelineOptions,
    /// Serialized options, part of every memo key.
    fingerprint: String,
    memo: Box<dyn CacheBucket>,
}

impl Pipeline {
    /// Create a pipeline memoizing into a private in-memory cache of at most
    /// [`MEMO_CAPACITY`] preprocessed documents.
    #[must_use]
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_cache(options, &MemoryCache::with_capacity(MEMO_CAPACITY))
    }

    /// Create a pipeline memoizing into `cache`.
    #[must_use]
    pub fn with_cache(options: PipelineOptions, cache: &dyn Cache) -> Self {
        let fingerprint = serde_json::to_string(&options).unwrap_or_default();
        Self {
            options,
            fingerprint,
            memo: cache.bucket("preprocess"),
        }
    }

    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run the text stages over a document.
    ///
    /// Pure, so results are memoized by options and document text.
    #[must_use]
    pub fn preprocess(&self, document: &str) -> Preprocessed {
        let key = content_key(&[&self.fingerprint, document]);
        self.memo
            .get_or_insert_json_with(&key, env!("CARGO_PKG_VERSION"), || {
                self.preprocess_uncached(document)
            })
    }

    fn preprocess_uncached(&self, document: &str) -> Preprocessed {
        let protected = protect(document);
        let extract_options = ExtractOptions {
            minecraft_avatar_url: self.options.minecraft_avatar_url.clone(),
        };
        let extracted = extract_blocks(&protected.masked, &protected.spans, &extract_options);
        let text = transform_inline(&extracted.text);
        let text = reindent_nested_lists(&text, self.options.nesting_indent);
        let markdown = protected.restore(&text);
        let list_entries = scan_ordered_lists(&markdown, self.renderer().parser_options());

        tracing::debug!(
            blocks = extracted.blocks,
            spans = protected.spans.len(),
            list_items = list_entries.len(),
            "preprocessed document"
        );
        Preprocessed {
            markdown,
            list_entries,
            warnings: extracted.warnings,
        }
    }

    fn renderer(&self) -> MarkdownRenderer<HtmlBackend> {
        MarkdownRenderer::new().with_gfm(self.options.gfm)
    }

    /// Render a standalone page.
    #[must_use]
    pub fn render(&self, document: &str) -> Rendered {
        self.render_with(document, &mut RenderContext::new())
    }

    /// Render a document as part of the page `ctx` belongs to.
    pub fn render_with(&self, document: &str, ctx: &mut RenderContext) -> Rendered {
        let first_warning = ctx.warnings.len();
        let realized = self.realize(document, ctx);
        Rendered {
            html: realized.html,
            title: realized.title,
            toc: realized.toc,
            blocks: realized.blocks,
            warnings: ctx.warnings[first_warning..].to_vec(),
            template: realized.template,
            context: ctx.clone(),
        }
    }

    /// Render a document nested inside a block and return its HTML.
    pub fn render_fragment(&self, document: &str, ctx: &mut RenderContext) -> String {
        ctx.depth += 1;
        let realized = self.realize(document, ctx);
        ctx.depth -= 1;
        realized.html
    }

    /// Render a single line of inline markdown, such as a block title.
    pub fn render_inline(&self, text: &str, ctx: &mut RenderContext) -> String {
        let html = self.render_fragment(text, ctx);
        let trimmed = html.trim_end();
        match trimmed
            .strip_prefix("<p>")
            .and_then(|s| s.strip_suffix("</p>"))
        {
            Some(inner) if !inner.contains("<p>") => inner.to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    /// Make pane `pane` of the tab group at `rendered.blocks[block]` active,
    /// rendering it first if needed.
    ///
    /// Returns `false` if there is no such tab group or pane.
    pub fn activate_pane(&self, rendered: &mut Rendered, block: usize, pane: usize) -> bool {
        let Some(ContentBlock::Tabs(view)) = rendered.blocks.get_mut(block) else {
            return false;
        };
        if pane >= view.panes.len() {
            return false;
        }

        let first_warning = rendered.context.warnings.len();
        view.realize(pane, self, &mut rendered.context);
        view.active = pane;
        rendered
            .warnings
            .extend_from_slice(&rendered.context.warnings[first_warning..]);
        rendered.html = splice(&rendered.template, &rendered.blocks);
        true
    }

    fn realize(&self, document: &str, ctx: &mut RenderContext) -> Realized {
        let preprocessed = self.preprocess(document);
        ctx.warnings.extend(preprocessed.warnings.iter().cloned());

        let mut renderer = self
            .renderer()
            .with_heading_ids(std::mem::take(&mut ctx.heading_ids));
        if self.options.extract_title && ctx.depth == 0 {
            renderer = renderer.with_title_extraction();
        }
        let result = renderer.render_markdown(&preprocessed.markdown);
        ctx.heading_ids = renderer.take_heading_ids();

        let template = if self.options.renumber_lists {
            renumber_list_items(&result.html, &preprocessed.list_entries)
        } else {
            result.html
        };

        let blocks: Vec<ContentBlock> = result
            .carriers
            .iter()
            .map(|carrier| dispatch(carrier, self, ctx))
            .collect();

        Realized {
            html: splice(&template, &blocks),
            template,
            title: result.title,
            toc: result.toc,
            blocks,
        }
    }
}

/// Replace every block placeholder in `template` with its block's HTML.
fn splice(template: &str, blocks: &[ContentBlock]) -> String {
    BLOCK_PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| blocks.get(index))
                .map(ContentBlock::to_html)
                .unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Pane;
    use pretty_assertions::assert_eq;

    fn pipeline() -> Pipeline {
        Pipeline::new(PipelineOptions::default())
    }

    #[test]
    fn test_plain_markdown() {
        let rendered = pipeline().render("Hello **world**");
        assert_eq!(rendered.html, "<p>Hello <strong>world</strong></p>");
        assert!(rendered.blocks.is_empty());
        assert!(rendered.warnings.is_empty());
    }

    #[test]
    fn test_alert_defaults_to_info() {
        let rendered = pipeline().render(":::alert{}content:::");
        assert!(matches!(
            rendered.blocks.as_slice(),
            [ContentBlock::Alert(view)] if view.title_html.is_none()
        ));
        assert!(
            rendered
                .html
                .starts_with(r#"<div class="alert alert-info" role="note">"#)
        );
        assert!(rendered.html.contains("<p>content</p>"));
        assert!(!rendered.html.contains("alert-title"));
        assert!(!rendered.html.contains(crate::renderer::BLOCK_START));
    }

    #[test]
    fn test_chart_failure_is_local() {
        let rendered = pipeline().render("Before.\n\n:::chart{type:bar}\n{not json\n:::\n\nAfter.");
        assert!(rendered.html.starts_with("<p>Before.</p>"));
        assert!(rendered.html.trim_end().ends_with("<p>After.</p>"));
        assert_eq!(rendered.html.matches("lumen-error").count(), 1);
        assert!(rendered.blocks[0].is_error());
        assert_eq!(rendered.warnings.len(), 1);

        let before = rendered.html.find("Before.").unwrap();
        let error = rendered.html.find("lumen-error").unwrap();
        let after = rendered.html.find("After.").unwrap();
        assert!(before < error && error < after);
    }

    #[test]
    fn test_unknown_chart_kind_named() {
        let rendered = pipeline().render(":::chart{type:donut}\n{}\n:::");
        assert!(rendered.html.contains("Unknown chart type: donut"));
    }

    #[test]
    fn test_link_card_without_url_stays_literal() {
        let rendered = pipeline().render(":::link-card{title:X}body:::");
        assert_eq!(rendered.html, "<p>:::link-card{title:X}body:::</p>");
        assert!(rendered.blocks.is_empty());
        assert_eq!(rendered.warnings.len(), 1);
    }

    #[test]
    fn test_chat_message_avatars() {
        let source = ":::chat\n@person name:A\nhi\n@person name:B, avatar:minecraft\nyo\n:::";
        let rendered = pipeline().render(source);
        let [ContentBlock::Chat(chat)] = rendered.blocks.as_slice() else {
            panic!("expected one chat block, got {:?}", rendered.blocks);
        };
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].avatar, None);
        assert!(chat.messages[1].avatar.as_deref().unwrap().contains('B'));
        assert_eq!(chat.messages[1].content, "<p>yo</p>");
    }

    #[test]
    fn test_list_numbering_fidelity() {
        let rendered = pipeline().render("1. a\n2. b\n    1. c\n    2. d\n3. e");
        let values: Vec<&str> = rendered
            .html
            .match_indices(r#"<li value=""#)
            .map(|(i, m)| {
                let rest = &rendered.html[i + m.len()..];
                &rest[..rest.find('"').unwrap()]
            })
            .collect();
        assert_eq!(values, vec!["1", "2", "1", "2", "3"]);
    }

    #[test]
    fn test_shallow_nested_list_is_nested() {
        let rendered = pipeline().render("1. a\n  1. b\n2. c");
        assert_eq!(rendered.html.matches("<ol>").count(), 2);
    }

    #[test]
    fn test_quoted_list_does_not_take_later_numbers() {
        let html = pipeline().render("> 1. a\n> 2. b\n\n5. x\n6. y\n").html;
        let values: Vec<&str> = html
            .split("value=\"")
            .skip(1)
            .filter_map(|rest| rest.split('"').next())
            .collect();
        assert_eq!(values, vec!["1", "2", "5", "6"]);
    }

    #[test]
    fn test_code_in_indented_block_keeps_shape() {
        let rendered = pipeline()
            .render("1. item\n\n    :::alert\n    ```\n    code\n    ```\n    after\n    :::\n");
        assert!(rendered.html.contains("<pre><code>code\n</code></pre>"));
        assert!(rendered.html.contains("<p>after</p>"));
        assert!(!rendered.html.contains("    code"));
    }

    #[test]
    fn test_code_moves_with_reindented_list_item() {
        let preprocessed =
            pipeline().preprocess("1. a\n  1. b\n\n     ```\n     code\n     ```\n");
        assert_eq!(
            preprocessed.markdown,
            "1. a\n    1. b\n\n       ```\n       code\n       ```\n"
        );
    }

    #[test]
    fn test_typed_placeholder_is_not_spliced() {
        let rendered = pipeline().render("<!--lumen-block-0-->\n\n:::alert{}secret:::\n");
        assert_eq!(rendered.html.matches("secret").count(), 1);
        assert!(rendered.html.contains("<!--lumen-block-0-->"));

        let token = crate::renderer::block_placeholder(0);
        let rendered = pipeline().render(&format!("{token}\n\n:::alert{{}}secret:::\n"));
        assert_eq!(rendered.html.matches("secret").count(), 1);
        assert!(rendered.html.contains("&#xE002;0&#xE003;"));
    }

    #[test]
    fn test_renumbering_can_be_disabled() {
        let options = PipelineOptions {
            renumber_lists: false,
            ..PipelineOptions::default()
        };
        let rendered = Pipeline::new(options).render("1. a\n2. b");
        assert!(!rendered.html.contains("value="));
    }

    #[test]
    fn test_preprocess_is_idempotent() {
        let source = "# Title\n\n:::alert{type:success, title:Done}\nAll ==good== here.\n:::\n\n\
                      Water is H~2~O and E=mc^2^.\n\n1. one\n  1. nested\n\n```\n:::alert\n==x==\n```\n";
        let pipeline = pipeline();
        let once = pipeline.preprocess(source);
        let twice = pipeline.preprocess(&once.markdown);
        assert_eq!(twice.markdown, once.markdown);
        assert_eq!(twice.list_entries, once.list_entries);
    }

    #[test]
    fn test_code_is_never_rewritten() {
        let rendered = pipeline().render("Use `==x==` or\n\n```\n:::alert\nhi\n:::\n```");
        assert!(rendered.html.contains("<code>==x==</code>"));
        assert!(rendered.html.contains(":::alert\nhi\n:::"));
        assert!(rendered.blocks.is_empty());
    }

    #[test]
    fn test_preprocess_is_memoized() {
        let cache = MemoryCache::new();
        let pipeline = Pipeline::with_cache(PipelineOptions::default(), &cache);
        let first = pipeline.preprocess("Some ==text==");
        let second = pipeline.preprocess("Some ==text==");
        assert_eq!(first, second);
        assert_eq!(cache.entry_count("preprocess"), 1);

        let eager = Pipeline::with_cache(
            PipelineOptions {
                tabs: TabsMode::Eager,
                ..PipelineOptions::default()
            },
            &cache,
        );
        let _ = eager.preprocess("Some ==text==");
        assert_eq!(cache.entry_count("preprocess"), 2);
    }

    #[test]
    fn test_heading_ids_unique_across_nested_documents() {
        let source = "## Setup\n\n:::tabs\n@tab One\n## Setup\n:::\n";
        let rendered = pipeline().render(source);
        assert!(rendered.html.contains(r#"<h2 id="setup">"#));
        assert!(rendered.html.contains(r#"<h2 id="setup-1">"#));
    }

    #[test]
    fn test_fresh_render_resets_heading_ids() {
        let pipeline = pipeline();
        let first = pipeline.render("## Intro");
        let second = pipeline.render("## Intro");
        assert_eq!(first.html, second.html);
    }

    #[test]
    fn test_title_only_from_top_level() {
        let options = PipelineOptions {
            extract_title: true,
            ..PipelineOptions::default()
        };
        let rendered = Pipeline::new(options).render(":::alert\n# Inner\n:::\n\n# Outer");
        assert_eq!(rendered.title.as_deref(), Some("Outer"));
    }

    #[test]
    fn test_activate_pane_realizes_once() {
        let pipeline = pipeline();
        let mut rendered = pipeline.render(":::tabs\n@tab A\nfirst\n@tab B\n**second**\n:::");
        assert!(rendered.html.contains("data-lumen-pending"));

        assert!(pipeline.activate_pane(&mut rendered, 0, 1));
        let ContentBlock::Tabs(view) = &rendered.blocks[0] else {
            panic!("expected tabs");
        };
        assert_eq!(view.active, 1);
        assert!(view.panes.iter().all(Pane::is_realized));
        assert!(!rendered.html.contains("data-lumen-pending"));
        assert!(rendered.html.contains("<p><strong>second</strong></p>"));
        assert!(rendered.html.contains(r#"aria-labelledby="tab-0-0" hidden>"#));

        assert!(pipeline.activate_pane(&mut rendered, 0, 0));
        assert!(rendered.html.contains("<p>first</p>"));
        assert!(rendered.html.contains("<p><strong>second</strong></p>"));

        assert!(!pipeline.activate_pane(&mut rendered, 0, 5));
        assert!(!pipeline.activate_pane(&mut rendered, 3, 0));
    }

    #[test]
    fn test_nested_tabs_are_realized() {
        let source = ":::tabs\n@tab Outer\n:::tabs\n@tab A\na\n@tab B\nb\n:::\n:::";
        let rendered = pipeline().render(source);
        assert!(rendered.html.contains("<p>b</p>"));
        assert_eq!(rendered.html.matches("data-lumen-pending").count(), 0);
    }

    #[test]
    fn test_nested_blocks_render_through_pipeline() {
        let source = ":::timeline\n@item 2024 | Launch\nWith ^sup^ and a ==mark==\n:::";
        let rendered = pipeline().render(source);
        assert!(rendered.html.contains(r#"<time class="timeline-date">2024</time>"#));
        assert!(rendered.html.contains("<sup>sup</sup>"));
        assert!(rendered.html.contains("<mark>mark</mark>"));
    }

    #[test]
    fn test_shared_context_keeps_tab_ids_unique() {
        let pipeline = pipeline();
        let mut ctx = RenderContext::new();
        let a = pipeline.render_with(":::tabs\n@tab A\na\n:::", &mut ctx);
        let b = pipeline.render_with(":::tabs\n@tab A\na\n:::", &mut ctx);
        assert!(a.html.contains(r#"id="tabs-0""#));
        assert!(b.html.contains(r#"id="tabs-1""#));
    }

    #[test]
    fn test_render_inline_strips_paragraph() {
        let pipeline = pipeline();
        let mut ctx = RenderContext::new();
        assert_eq!(pipeline.render_inline("a *b*", &mut ctx), "a <em>b</em>");
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: PipelineOptions = serde_json::from_str(r#"{"tabs":"eager"}"#).unwrap();
        assert_eq!(options.tabs, TabsMode::Eager);
        assert!(options.gfm);
        assert_eq!(options.nesting_indent, 4);
    }
}
