//! Text passes applied to decoded PDF runs and pages.

use std::borrow::Cow;

use lopdf::Object;

/// Separator placed between consecutive pages of a document.
pub const PAGE_BREAK: &str = "\n\n";

// ---------------------------------------------------------------------------
// Run decoding
// ---------------------------------------------------------------------------

/// Decode a string operand shown with a font that has no usable encoding.
///
/// Follows PDF text-string rules via lopdf (UTF-16BE or UTF-8 when
/// BOM-prefixed, PDFDocEncoding otherwise); lossy UTF-8 if that fails.
pub(crate) fn decode_unmapped(obj: &Object) -> String {
    match lopdf::decode_text_string(obj) {
        Ok(text) => text,
        Err(_) => match obj {
            Object::String(bytes, _) => String::from_utf8_lossy(bytes).into_owned(),
            _ => String::new(),
        },
    }
}

/// Percent-decode a text run (`Check%20oil` → `Check oil`).
///
/// Invalid escapes are left untouched; a run whose escapes decode to
/// invalid UTF-8 is kept as-is.
pub(crate) fn percent_decode_run(run: &str) -> Cow<'_, str> {
    if !run.contains('%') {
        return Cow::Borrowed(run);
    }
    match urlencoding::decode(run) {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(run),
    }
}

// ---------------------------------------------------------------------------
// Page text
// ---------------------------------------------------------------------------

/// Join the decoded runs of one page.
pub(crate) fn join_runs(runs: &[String]) -> String {
    runs.iter()
        .map(|r| r.trim_end_matches(['\r', '\n']))
        .filter(|r| !r.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
