//! Content-stream walking: turn a page's text-showing operators into runs.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Encoding, Object, ObjectId};
use tracing::debug;

use manualchat_shared::{ManualChatError, Result};

use crate::text::{decode_unmapped, percent_decode_run};

/// TJ kerning (thousandths of a text-space unit) wider than this is
/// treated as a word gap.
const KERN_WORD_GAP: f32 = 200.0;

/// Text encodings of the fonts a page can select with `Tf`, keyed by
/// resource name.
pub(crate) type FontEncodings<'a> = BTreeMap<Vec<u8>, Encoding<'a>>;

/// Collect the decoded text runs of one page in content-stream order.
///
/// Fails when the page's resources or content cannot be read.
pub(crate) fn page_runs(doc: &Document, page_id: ObjectId) -> Result<Vec<String>> {
    let fonts = page_encodings(doc, page_id)?;

    let bytes = doc
        .get_page_content(page_id)
        .map_err(|e| ManualChatError::parse(format!("page {page_id:?} content: {e}")))?;

    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let content = Content::decode(&bytes)
        .map_err(|e| ManualChatError::parse(format!("page {page_id:?} content stream: {e}")))?;

    Ok(runs_from_operations(&content.operations, &fonts))
}

/// Resolve every font in the page's resources to its text encoding.
///
/// A font lopdf cannot map (no `/Encoding` it knows, Identity-H without
/// `/ToUnicode`) is left out; its runs fall back to [`decode_unmapped`].
fn page_encodings(doc: &Document, page_id: ObjectId) -> Result<FontEncodings<'_>> {
    let fonts = doc
        .get_page_fonts(page_id)
        .map_err(|e| ManualChatError::parse(format!("page {page_id:?} resources: {e}")))?;

    let mut encodings = BTreeMap::new();
    for (name, font) in fonts {
        if !font.type_is(b"Font") {
            continue;
        }
        match font.get_font_encoding(doc) {
            Ok(encoding) => {
                encodings.insert(name, encoding);
            }
            Err(e) => debug!(
                font = %String::from_utf8_lossy(&name),
                error = %e,
                "font has no usable encoding"
            ),
        }
    }
    Ok(encodings)
}

/// Walk text operators, flushing the current run on every line move.
pub(crate) fn runs_from_operations(operations: &[Operation], fonts: &FontEncodings<'_>) -> Vec<String> {
    let mut runs = RunBuilder::default();

    for op in operations {
        match op.operator.as_str() {
            "Tf" => {
                runs.encoding = op
                    .operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .and_then(|name| fonts.get(name));
            }
            "Tj" => {
                if let Some(s) = op.operands.first() {
                    runs.push_string(s);
                }
            }
            // ' and " move to the next line before showing their string.
            "'" => {
                runs.flush();
                if let Some(s) = op.operands.first() {
                    runs.push_string(s);
                }
            }
            "\"" => {
                runs.flush();
                if let Some(s) = op.operands.get(2) {
                    runs.push_string(s);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match item {
                            Object::String(..) => runs.push_string(item),
                            other => {
                                if let Ok(kern) = other.as_float() {
                                    if -kern > KERN_WORD_GAP {
                                        runs.push_gap();
                                    }
                                }
                            }
                        }
                    }
                }
            }
            "Td" | "TD" | "T*" | "Tm" | "ET" => runs.flush(),
            _ => {}
        }
    }

    runs.finish()
}

// ---------------------------------------------------------------------------
// Run accumulation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RunBuilder<'f> {
    runs: Vec<String>,
    current: String,
    /// Encoding of the font last selected with `Tf`.
    encoding: Option<&'f Encoding<'f>>,
}

impl RunBuilder<'_> {
    fn push_string(&mut self, obj: &Object) {
        let Object::String(bytes, _) = obj else {
            return;
        };
        let decoded = self
            .encoding
            .and_then(|encoding| Document::decode_text(encoding, bytes).ok())
            .unwrap_or_else(|| decode_unmapped(obj));
        self.current.push_str(&decoded);
    }

    fn push_gap(&mut self) {
        if !self.current.is_empty() && !self.current.ends_with(' ') {
            self.current.push(' ');
        }
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let raw = std::mem::take(&mut self.current);
        self.runs.push(percent_decode_run(&raw).into_owned());
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(ops: &[Operation]) -> Vec<String> {
        runs_from_operations(ops, &FontEncodings::new())
    }

    fn tj(s: &str) -> Operation {
        Operation::new("Tj", vec![Object::string_literal(s)])
    }

    fn td() -> Operation {
        Operation::new("Td", vec![0.into(), (-14).into()])
    }

    #[test]
    fn splits_runs_on_line_moves() {
        let ops = vec![
            Operation::new("BT", vec![]),
            tj("1. Maintenance"),
            td(),
            tj("- Check%20oil"),
            Operation::new("ET", vec![]),
        ];
        assert_eq!(runs(&ops), vec!["1. Maintenance", "- Check oil"]);
    }

    #[test]
    fn consecutive_tj_share_a_run() {
        // An escape split across two Tj operators still decodes.
        let ops = vec![tj("Check%2"), tj("0oil"), Operation::new("ET", vec![])];
        assert_eq!(runs(&ops), vec!["Check oil"]);
    }

    #[test]
    fn tj_array_kerning() {
        let array = Object::Array(vec![
            Object::string_literal("Re"),
            Object::Integer(-30),
            Object::string_literal("place"),
            Object::Real(-450.0),
            Object::string_literal("filter"),
        ]);
        let ops = vec![Operation::new("TJ", vec![array])];
        assert_eq!(runs(&ops), vec!["Replace filter"]);
    }

    #[test]
    fn quote_operators_start_new_runs() {
        let ops = vec![
            tj("first"),
            Operation::new("'", vec![Object::string_literal("second")]),
            Operation::new(
                "\"",
                vec![0.into(), 0.into(), Object::string_literal("third")],
            ),
        ];
        assert_eq!(runs(&ops), vec!["first", "second", "third"]);
    }

    #[test]
    fn ignores_non_text_operators() {
        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new("re", vec![0.into(), 0.into(), 10.into(), 10.into()]),
            Operation::new("Q", vec![]),
        ];
        assert!(runs(&ops).is_empty());
    }

    #[test]
    fn unknown_font_falls_back_to_text_string_decoding() {
        // No encoding for /F9, so the UTF-16BE BOM decides.
        let ops = vec![
            Operation::new("Tf", vec!["F9".into(), 12.into()]),
            Operation::new(
                "Tj",
                vec![Object::string_literal(vec![0xFE, 0xFF, 0x00, 0x4F, 0x00, 0x69, 0x00, 0x6C])],
            ),
        ];
        assert_eq!(runs(&ops), vec!["Oil"]);
    }

    #[test]
    fn font_switch_does_not_split_a_run() {
        let ops = vec![
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            tj("Do not "),
            Operation::new("Tf", vec!["F2".into(), 12.into()]),
            tj("open"),
            Operation::new("ET", vec![]),
        ];
        assert_eq!(runs(&ops), vec!["Do not open"]);
    }
}
