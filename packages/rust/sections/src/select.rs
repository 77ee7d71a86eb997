//! Lexical relevance selection.

use manualchat_shared::Section;

/// Lowercase terms derived from a free-text question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelevanceQuery {
    terms: Vec<String>,
}

impl RelevanceQuery {
    /// Lowercase and split on whitespace. Duplicate terms are kept once.
    pub fn parse(query: &str) -> Self {
        let mut terms: Vec<String> = Vec::new();
        for term in query.to_lowercase().split_whitespace() {
            if !terms.iter().any(|t| t == term) {
                terms.push(term.to_string());
            }
        }
        Self { terms }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether any term occurs anywhere in the section's title or bullets.
    pub fn matches(&self, section: &Section) -> bool {
        let haystack = section_text(section);
        self.terms.iter().any(|t| haystack.contains(t.as_str()))
    }
}

fn section_text(section: &Section) -> String {
    let mut text = section.title.to_lowercase();
    for bullet in &section.bullets {
        text.push(' ');
        text.push_str(&bullet.to_lowercase());
    }
    text
}

/// Keep the sections that match `query`, in their original order.
///
/// An absent or blank query keeps everything. When nothing matches, the
/// full list is returned so a non-empty input never yields an empty output.
pub fn select(sections: Vec<Section>, query: Option<&str>) -> Vec<Section> {
    let query = RelevanceQuery::parse(query.unwrap_or_default());
    if query.is_empty() {
        return sections;
    }

    let mask: Vec<bool> = sections.iter().map(|s| query.matches(s)).collect();
    let matched = mask.iter().filter(|m| **m).count();

    if matched == 0 {
        tracing::debug!(
            sections = sections.len(),
            "no section matched the query, keeping all"
        );
        return sections;
    }

    tracing::debug!(sections = sections.len(), matched, "selected relevant sections");
    sections
        .into_iter()
        .zip(mask)
        .filter_map(|(s, keep)| keep.then_some(s))
        .collect()
}
