//! Section segmentation, relevance selection, and rendering.
//!
//! The chat path runs extracted document text through [`segment`], filters
//! the result with [`select`] against the user's message, and renders what
//! is left with [`render_sections`].

mod segment;
mod select;

pub use segment::{normalize_whitespace, segment};
pub use select::{RelevanceQuery, select};

use manualchat_shared::Section;

/// Separator between rendered sections.
const SECTION_SEPARATOR: &str = "\n\n";

/// Render one section: the title, then each bullet on an indented line.
pub fn render_section(section: &Section) -> String {
    let mut out = section.title.clone();
    for bullet in &section.bullets {
        out.push_str("\n  - ");
        out.push_str(bullet);
    }
    out
}

/// Render sections in order, separated by a blank line.
pub fn render_sections(sections: &[Section]) -> String {
    sections
        .iter()
        .map(render_section)
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

/// Segment `text` and keep the sections relevant to `query`.
pub fn relevant_sections(text: &str, query: Option<&str>) -> Vec<Section> {
    select(segment(text), query)
}
