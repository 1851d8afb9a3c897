//! Timeline and chat blocks. Every item is a nested document.

use std::fmt::Write;

use crate::block::{Block, BlockBody};
use crate::pipeline::{Pipeline, RenderContext};
use crate::state::escape_html;

/// One timeline event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub date: Option<String>,
    /// Rendered inline title.
    pub title_html: Option<String>,
    pub content: String,
}

/// A `:::timeline` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineView {
    pub items: Vec<TimelineEntry>,
}

pub(crate) fn build_timeline(
    block: &Block,
    pipeline: &Pipeline,
    ctx: &mut RenderContext,
) -> Result<TimelineView, String> {
    let BlockBody::Timeline(items) = &block.body else {
        return Err("Timeline block has no @item entries".to_owned());
    };
    let items = items
        .iter()
        .map(|item| TimelineEntry {
            date: item.date.clone(),
            title_html: item
                .title
                .as_deref()
                .map(|title| pipeline.render_inline(title, ctx)),
            content: pipeline.render_fragment(&item.content, ctx),
        })
        .collect();
    Ok(TimelineView { items })
}

impl TimelineView {
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::from(r#"<ol class="timeline">"#);
        for item in &self.items {
            out.push_str(r#"<li class="timeline-item">"#);
            if let Some(date) = &item.date {
                let _ = write!(out, r#"<time class="timeline-date">{}</time>"#, escape_html(date));
            }
            if let Some(title) = &item.title_html {
                let _ = write!(out, r#"<div class="timeline-title">{title}</div>"#);
            }
            let _ = write!(
                out,
                r#"<div class="timeline-content">{}</div></li>"#,
                item.content
            );
        }
        out.push_str("</ol>");
        out
    }
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub name: String,
    /// Resolved avatar URL.
    pub avatar: Option<String>,
    pub content: String,
}

/// A `:::chat` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatView {
    pub messages: Vec<ChatLine>,
}

pub(crate) fn build_chat(
    block: &Block,
    pipeline: &Pipeline,
    ctx: &mut RenderContext,
) -> Result<ChatView, String> {
    let BlockBody::Chat(messages) = &block.body else {
        return Err("Chat block has no @person messages".to_owned());
    };
    let messages = messages
        .iter()
        .map(|message| ChatLine {
            name: message.person.name.clone(),
            avatar: message.person.avatar.clone(),
            content: pipeline.render_fragment(&message.content, ctx),
        })
        .collect();
    Ok(ChatView { messages })
}

impl ChatView {
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::from(r#"<div class="chat">"#);
        for message in &self.messages {
            let name = escape_html(&message.name);
            out.push_str(r#"<div class="chat-message"><div class="chat-person">"#);
            if let Some(avatar) = &message.avatar {
                let _ = write!(
                    out,
                    r#"<img class="chat-avatar" src="{}" alt="{name}" loading="lazy">"#,
                    escape_html(avatar)
                );
            }
            let _ = write!(
                out,
                r#"<span class="chat-name">{name}</span></div><div class="chat-content">{}</div></div>"#,
                message.content
            );
        }
        out.push_str("</div>");
        out
    }
}
