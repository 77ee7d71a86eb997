//! PDF text extraction.
//!
//! Loads a PDF with `lopdf`, walks each page's content stream collecting
//! text runs decoded through the page's font encodings, percent-decodes
//! every run, and exposes the result as whole text, per-page text, or an
//! inclusive page range. A page that cannot be read is kept as empty text.

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
mod pdf;
mod text;

use std::path::{Path, PathBuf};

use lopdf::Document;
use tracing::{debug, instrument, warn};

use manualchat_shared::{ExtractedText, ManualChatError, PageText, Result};

pub use text::PAGE_BREAK;

// ---------------------------------------------------------------------------
// SourceDocument
// ---------------------------------------------------------------------------

/// A parsed document, held as decoded page text.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    path: PathBuf,
    pages: Vec<PageText>,
}

impl SourceDocument {
    /// Read and parse the PDF at `path`.
    ///
    /// A missing or unreadable file is an `Io` error; bytes that are not a
    /// usable PDF are a `Parse` error.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| ManualChatError::io(path, e))?;
        Self::from_bytes(path, &bytes)
    }

    /// Parse PDF bytes already in memory; `path` is kept for diagnostics.
    ///
    /// Only a document that fails to load or has no pages is an error.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: &[u8]) -> Result<Self> {
        let path = path.into();
        let doc = Document::load_mem(bytes)
            .map_err(|e| ManualChatError::parse(format!("{}: {e}", path.display())))?;

        let page_ids = doc.get_pages();
        if page_ids.is_empty() {
            return Err(ManualChatError::parse(format!(
                "{}: document has no pages",
                path.display()
            )));
        }

        let mut pages = Vec::with_capacity(page_ids.len());
        for (page_number, page_id) in page_ids {
            let text = match pdf::page_runs(&doc, page_id) {
                Ok(runs) => text::join_runs(&runs),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        page = page_number,
                        error = %e,
                        "unreadable page, keeping it empty"
                    );
                    String::new()
                }
            };
            pages.push(PageText { page_number, text });
        }

        debug!(pages = pages.len(), "extracted document text");
        Ok(Self { path, pages })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn num_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Per-page text, 1-indexed, in page order.
    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<PageText> {
        self.pages
    }

    /// All pages joined with [`PAGE_BREAK`].
    pub fn text(&self) -> ExtractedText {
        ExtractedText {
            text: join_pages(&self.pages),
            num_pages: self.num_pages(),
        }
    }

    /// Text of pages `start..=end` (1-indexed), joined like [`Self::text`].
    pub fn section(&self, start: u32, end: u32) -> Result<String> {
        let pages = self.num_pages();
        if start < 1 || start > end || end > pages {
            return Err(ManualChatError::range(start, end, pages));
        }

        let slice = &self.pages[(start - 1) as usize..end as usize];
        Ok(join_pages(slice))
    }
}

fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(PAGE_BREAK)
}

// ---------------------------------------------------------------------------
// Convenience entry points
// ---------------------------------------------------------------------------

/// Whole-document text and page count.
pub fn extract_text(path: &Path) -> Result<ExtractedText> {
    Ok(SourceDocument::open(path)?.text())
}

/// Per-page text.
pub fn extract_pages(path: &Path) -> Result<Vec<PageText>> {
    Ok(SourceDocument::open(path)?.into_pages())
}

/// Text of an inclusive, 1-indexed page range.
pub fn extract_section(path: &Path, start: u32, end: u32) -> Result<String> {
    SourceDocument::open(path)?.section(start, end)
}

/// Open a document on the blocking pool.
pub async fn load(path: PathBuf) -> Result<SourceDocument> {
    tokio::task::spawn_blocking(move || SourceDocument::open(&path))
        .await
        .map_err(|e| ManualChatError::parse(format!("extraction task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Object;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("mc_extract_{}", Uuid::now_v7()))
    }

    fn manual() -> Vec<u8> {
        fixtures::pdf_bytes(&[
            &["1. Safety", "- Disconnect%20power first"],
            &["2. Maintenance", "- Check oil", "- Grease the rail"],
            &["3. Troubleshooting", "- Motor hums but gate does not move"],
        ])
    }

    #[test]
    fn extracts_all_pages_in_order() {
        let doc = SourceDocument::from_bytes("manual.pdf", &manual()).unwrap();
        assert_eq!(doc.num_pages(), 3);

        let pages = doc.pages();
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[0].text, "1. Safety\n- Disconnect power first");
        assert_eq!(pages[2].page_number, 3);

        let full = doc.text();
        assert_eq!(full.num_pages, 3);
        assert!(full.text.starts_with("1. Safety"));
        assert!(full.text.contains("- Grease the rail\n\n3. Troubleshooting"));
    }

    #[test]
    fn section_is_inclusive() {
        let doc = SourceDocument::from_bytes("manual.pdf", &manual()).unwrap();
        assert_eq!(
            doc.section(2, 2).unwrap(),
            "2. Maintenance\n- Check oil\n- Grease the rail"
        );
        let two = doc.section(1, 2).unwrap();
        assert!(two.starts_with("1. Safety"));
        assert!(two.ends_with("- Grease the rail"));
        assert_eq!(doc.section(1, 3).unwrap(), doc.text().text);
    }

    #[test]
    fn section_rejects_bad_ranges() {
        let doc = SourceDocument::from_bytes("manual.pdf", &manual()).unwrap();
        for (start, end) in [(0, 1), (3, 2), (2, 4), (4, 4)] {
            let err = doc.section(start, end).unwrap_err();
            assert!(
                matches!(err, ManualChatError::Range { pages: 3, .. }),
                "{start}..={end} gave {err}"
            );
        }
    }

    #[test]
    fn win_ansi_punctuation() {
        let lines: [&[u8]; 2] = [b"1. Don\x92t \x96 open", b"- Caf\xE9 \x93door\x94"];
        let bytes = fixtures::win_ansi_pdf(&lines);
        let doc = SourceDocument::from_bytes("quotes.pdf", &bytes).unwrap();
        assert_eq!(doc.text().text, "1. Don\u{2019}t \u{2013} open\n- Caf\u{e9} \u{201c}door\u{201d}");
    }

    #[test]
    fn identity_h_text_goes_through_to_unicode() {
        let cmap = [(1, 'G'), (2, 'a'), (3, 't'), (4, 'e'), (5, '\u{2019}'), (6, 's')];
        let bytes = fixtures::to_unicode_pdf(&cmap, &[&[1, 2, 3, 4, 5, 6]]);
        let doc = SourceDocument::from_bytes("cid.pdf", &bytes).unwrap();
        assert_eq!(doc.text().text, "Gate\u{2019}s");
    }

    #[test]
    fn unreadable_page_is_kept_empty() {
        let mut doc = Document::load_mem(&manual()).unwrap();
        let page_two = doc.get_pages()[&2];
        // A Parent that is not a dictionary breaks resource lookup for
        // this page only.
        let bogus = doc.add_object(Object::Integer(0));
        doc.get_dictionary_mut(page_two).unwrap().set("Parent", bogus);

        let doc = SourceDocument::from_bytes("broken.pdf", &fixtures::save(&mut doc)).unwrap();
        let pages = doc.pages();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].text, "1. Safety\n- Disconnect power first");
        assert_eq!(pages[1].page_number, 2);
        assert_eq!(pages[1].text, "");
        assert_eq!(pages[2].text, "3. Troubleshooting\n- Motor hums but gate does not move");
    }

    #[test]
    fn garbage_bytes_are_parse_errors() {
        let err = SourceDocument::from_bytes("junk.pdf", b"This is not a PDF").unwrap_err();
        assert!(matches!(err, ManualChatError::Parse { .. }));
        assert!(err.is_document_failure());
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = temp_dir().join("nope.pdf");
        let err = extract_text(&path).unwrap_err();
        assert!(matches!(err, ManualChatError::Io { .. }));
    }

    #[test]
    fn file_entry_points() {
        let dir = temp_dir();
        let path = fixtures::write_pdf(&dir, "m.pdf", &[&["1. Intro"], &["2. Parts", "- Bolt"]])
            .unwrap();

        let text = extract_text(&path).unwrap();
        assert_eq!(text.text, "1. Intro\n\n2. Parts\n- Bolt");
        assert_eq!(extract_pages(&path).unwrap().len(), 2);
        assert_eq!(extract_section(&path, 2, 2).unwrap(), "2. Parts\n- Bolt");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn load_runs_off_the_async_thread() {
        let dir = temp_dir();
        let path = fixtures::write_pdf(&dir, "m.pdf", &[&["1. Intro"]]).unwrap();

        let doc = load(path.clone()).await.unwrap();
        assert_eq!(doc.path(), path.as_path());
        assert_eq!(doc.text().text, "1. Intro");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
