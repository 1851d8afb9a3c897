//! Leaf blocks: charts, videos and link cards. Only the link card body is
//! rendered, as inline markdown.

use std::fmt::Write;

use serde_json::Value;

use crate::block::Block;
use crate::pipeline::{Pipeline, RenderContext};
use crate::state::escape_html;
use crate::util::css_width;

/// Chart kinds understood by the charting front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartType {
    Line,
    Bar,
    Pie,
    Scatter,
    Radar,
    Area,
}

impl ChartType {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "line" => Some(Self::Line),
            "bar" => Some(Self::Bar),
            "pie" => Some(Self::Pie),
            "scatter" => Some(Self::Scatter),
            "radar" => Some(Self::Radar),
            "area" => Some(Self::Area),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Bar => "bar",
            Self::Pie => "pie",
            Self::Scatter => "scatter",
            Self::Radar => "radar",
            Self::Area => "area",
        }
    }
}

/// A `:::chart` block whose data parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub chart_type: ChartType,
    /// Chart data, re-serialized compactly.
    pub options: Value,
    pub title: Option<String>,
    /// CSS height.
    pub height: Option<String>,
}

pub(crate) fn build_chart(block: &Block) -> Result<ChartView, String> {
    let source = block.body.as_document().unwrap_or_default();
    let options: Value = serde_json::from_str(source)
        .map_err(|e| format!("Chart data must be valid JSON: {e}"))?;

    let type_name = block
        .attributes
        .get_non_empty("type")
        .or_else(|| options.get("type").and_then(Value::as_str))
        .unwrap_or("line");
    let chart_type = ChartType::from_name(type_name)
        .ok_or_else(|| format!("Unknown chart type: {type_name}"))?;

    let height = block.attributes.get_non_empty("height").map(|h| {
        let h = h.trim();
        if h.chars().all(|c| c.is_ascii_digit()) {
            format!("{h}px")
        } else {
            h.to_owned()
        }
    });

    Ok(ChartView {
        chart_type,
        title: block.attributes.get_non_empty("title").map(str::to_owned),
        height,
        options,
    })
}

impl ChartView {
    #[must_use]
    pub fn to_html(&self) -> String {
        let name = self.chart_type.name();
        let mut out = format!(
            r#"<figure class="chart chart-{name}" data-chart-type="{name}" data-chart-options="{}""#,
            escape_html(&self.options.to_string())
        );
        if let Some(height) = &self.height {
            let _ = write!(out, r#" style="height:{}""#, escape_html(height));
        }
        out.push('>');
        if let Some(title) = &self.title {
            let _ = write!(out, "<figcaption>{}</figcaption>", escape_html(title));
        }
        out.push_str("</figure>");
        out
    }
}

/// A `:::video` block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct VideoView {
    pub src: String,
    /// CSS width.
    pub width: Option<String>,
    /// `left`, `center` or `right`.
    pub align: &'static str,
    pub caption: Option<String>,
    pub autoplay: bool,
    pub controls: bool,
    pub looped: bool,
    pub muted: bool,
}

pub(crate) fn build_video(block: &Block) -> Result<VideoView, String> {
    let attrs = &block.attributes;
    let src = attrs
        .get_non_empty("src")
        .or_else(|| block.body.as_document().map(str::trim).filter(|s| !s.is_empty()))
        .ok_or_else(|| "Video block needs a src attribute or a URL body".to_owned())?;

    let align = match attrs.get("align").map(str::trim) {
        Some("left") => "left",
        Some("right") => "right",
        _ => "center",
    };

    Ok(VideoView {
        src: src.trim().to_owned(),
        width: attrs.get_non_empty("width").map(css_width),
        align,
        caption: attrs.get_non_empty("caption").map(str::to_owned),
        autoplay: attrs.flag("autoplay", false),
        controls: attrs.flag("controls", true),
        looped: attrs.flag("loop", false),
        muted: attrs.flag("muted", false),
    })
}

impl VideoView {
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut video = format!(r#"<video src="{}""#, escape_html(&self.src));
        for (on, name) in [
            (self.controls, "controls"),
            (self.autoplay, "autoplay"),
            (self.looped, "loop"),
            (self.muted, "muted"),
        ] {
            if on {
                video.push(' ');
                video.push_str(name);
            }
        }
        if self.autoplay {
            video.push_str(" playsinline");
        }
        video.push_str("></video>");

        let style = self
            .width
            .as_ref()
            .map(|w| format!(r#" style="width:{}""#, escape_html(w)))
            .unwrap_or_default();
        match &self.caption {
            Some(caption) => format!(
                r#"<figure class="video align-{}"{style}>{video}<figcaption>{}</figcaption></figure>"#,
                self.align,
                escape_html(caption)
            ),
            None => format!(r#"<div class="video align-{}"{style}>{video}</div>"#, self.align),
        }
    }
}

/// A `:::link-card` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCardView {
    pub url: String,
    pub title: String,
    /// Rendered description: the `description` attribute as text, otherwise
    /// the block body as markdown.
    pub description_html: Option<String>,
    pub image: Option<String>,
}

pub(crate) fn build_link_card(
    block: &Block,
    pipeline: &Pipeline,
    ctx: &mut RenderContext,
) -> Result<LinkCardView, String> {
    let attrs = &block.attributes;
    let url = attrs
        .get_non_empty("url")
        .ok_or_else(|| "Link card needs a url attribute".to_owned())?
        .trim()
        .to_owned();
    let description_html = match attrs.get_non_empty("description") {
        Some(text) => Some(escape_html(text)),
        None => block
            .body
            .as_document()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|body| pipeline.render_inline(body, ctx)),
    };

    Ok(LinkCardView {
        title: attrs.get_non_empty("title").unwrap_or(url.as_str()).to_owned(),
        image: attrs.get_non_empty("image").map(str::to_owned),
        description_html,
        url,
    })
}

impl LinkCardView {
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = format!(r#"<a class="link-card" href="{}">"#, escape_html(&self.url));
        if let Some(image) = &self.image {
            let _ = write!(
                out,
                r#"<img class="link-card-image" src="{}" alt="" loading="lazy">"#,
                escape_html(image)
            );
        }
        let _ = write!(
            out,
            r#"<span class="link-card-body"><span class="link-card-title">{}</span>"#,
            escape_html(&self.title)
        );
        if let Some(description) = &self.description_html {
            let _ = write!(
                out,
                r#"<span class="link-card-description">{description}</span>"#
            );
        }
        let _ = write!(
            out,
            r#"<span class="link-card-url">{}</span></span></a>"#,
            escape_html(&self.url)
        );
        out
    }
}
