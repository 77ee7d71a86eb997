//! Numbered-heading segmentation.
//!
//! Manual text typically reads `1. Maintenance - Check oil - Clean filter
//! 2. Safety - Wear gloves` once extracted and whitespace-normalized. Every
//! `<digits>. ` starts a new chunk; within a chunk the text before the first
//! hyphen is the title and the hyphen-separated remainder are bullets.

use std::sync::LazyLock;

use regex::Regex;

use manualchat_shared::Section;

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Start of a numbered heading: ASCII digits, a period, a space.
static BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+\. ").expect("boundary regex"));

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Bullet delimiter.
const BULLET: char = '-';

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Collapse every run of whitespace to one space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    WS_RE.replace_all(text.trim(), " ").into_owned()
}

// ---------------------------------------------------------------------------
// Segmentation
// ---------------------------------------------------------------------------

/// Split text into sections in source order.
///
/// The input is normalized first, so page breaks and line wraps from the
/// extractor do not affect the result. Text before the first numbered
/// heading becomes its own leading section.
pub fn segment(text: &str) -> Vec<Section> {
    let text = normalize_whitespace(text);
    if text.is_empty() {
        return Vec::new();
    }

    let mut starts: Vec<usize> = BOUNDARY_RE.find_iter(&text).map(|m| m.start()).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    starts
        .iter()
        .enumerate()
        .filter_map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            parse_chunk(&text[start..end])
        })
        .collect()
}

fn parse_chunk(chunk: &str) -> Option<Section> {
    let chunk = chunk.trim();
    if chunk.is_empty() {
        return None;
    }

    let (title, rest) = match chunk.split_once(BULLET) {
        Some((title, rest)) => (title.trim(), rest),
        None => (chunk, ""),
    };

    let bullets = rest
        .split(BULLET)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(String::from)
        .collect();

    Some(Section::new(title, bullets))
}
