//! Splitting container bodies into marker-delimited sections.

use super::header::{is_closing_fence, opens_container};

/// A body section introduced by a marker line such as `@tab Label`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Section {
    /// Text after the marker on its line.
    pub(crate) header: String,
    /// Lines up to the next marker.
    pub(crate) content: String,
}

/// Split `body` on lines starting with `marker`.
///
/// Text before the first marker is dropped. Markers inside nested containers
/// belong to the nested block and do not split this one.
pub(crate) fn split_sections(body: &str, marker: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<Section> = None;
    let mut depth = 0usize;

    for line in body.split_inclusive('\n') {
        if depth == 0
            && let Some(header) = marker_rest(line.trim(), marker)
        {
            sections.extend(current.take());
            current = Some(Section {
                header: header.to_owned(),
                content: String::new(),
            });
            continue;
        }

        if is_closing_fence(line) {
            depth = depth.saturating_sub(1);
        } else if opens_container(line) {
            depth += 1;
        }

        if let Some(section) = current.as_mut() {
            section.content.push_str(line);
        }
    }
    sections.extend(current);
    sections
}

/// Rest of the line after `marker`, if the line is a marker line.
fn marker_rest<'a>(trimmed: &'a str, marker: &str) -> Option<&'a str> {
    let rest = trimmed.strip_prefix(marker)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}
