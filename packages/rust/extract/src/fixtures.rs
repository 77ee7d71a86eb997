//! Minimal PDF builder for tests.
//!
//! Each page is a list of lines; every line becomes one `Tj` run on its own
//! text line, so extraction yields the lines back in order.

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, StringFormat, Stream, dictionary};

/// Build a PDF in memory with one page per entry of `pages`, set in
/// WinAnsi-encoded Helvetica. Lines are written byte for byte, so keep
/// them ASCII.
pub fn pdf_bytes(pages: &[&[&str]]) -> Vec<u8> {
    let pages: Vec<Vec<Object>> = pages
        .iter()
        .map(|lines| lines.iter().map(|l| Object::string_literal(*l)).collect())
        .collect();
    build(pages, |_| win_ansi_font())
}

/// One page whose lines are raw WinAnsi bytes (e.g. `0x92` for `’`).
pub fn win_ansi_pdf(lines: &[&[u8]]) -> Vec<u8> {
    let page: Vec<Object> = lines.iter().map(|l| Object::string_literal(l.to_vec())).collect();
    build(vec![page], |_| win_ansi_font())
}

/// One page set in an Identity-H font whose `/ToUnicode` map sends each
/// two-byte code in `cmap` to its char. Lines are sequences of codes.
pub fn to_unicode_pdf(cmap: &[(u16, char)], lines: &[&[u16]]) -> Vec<u8> {
    let page: Vec<Object> = lines
        .iter()
        .map(|codes| {
            let bytes = codes.iter().flat_map(|c| c.to_be_bytes()).collect();
            Object::String(bytes, StringFormat::Hexadecimal)
        })
        .collect();

    build(vec![page], |doc| {
        let to_unicode = doc.add_object(Stream::new(dictionary! {}, to_unicode_cmap(cmap)));
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "ManualSans",
            "Encoding" => "Identity-H",
            "ToUnicode" => to_unicode,
        }
    })
}

/// Write a PDF built by [`pdf_bytes`] to `dir/name`.
pub fn write_pdf(dir: &Path, name: &str, pages: &[&[&str]]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, pdf_bytes(pages))?;
    Ok(path)
}

/// Serialize a document built or edited in a test.
pub fn save(doc: &mut Document) -> Vec<u8> {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail short of OOM.
    let _ = doc.save_to(&mut buf);
    buf
}

fn win_ansi_font() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    }
}

fn to_unicode_cmap(cmap: &[(u16, char)]) -> Vec<u8> {
    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );
    out.push_str(&format!("{} beginbfchar\n", cmap.len()));
    for (code, ch) in cmap {
        out.push_str(&format!("<{code:04X}> <{:04X}>\n", *ch as u32));
    }
    out.push_str(
        "endbfchar\n\
         endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    out.into_bytes()
}

/// Lay out `pages` (string operands, one per line) under a single font `F1`
/// shared through the page tree's resources.
fn build(pages: Vec<Vec<Object>>, font: impl FnOnce(&mut Document) -> Dictionary) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font = font(&mut doc);
    let font_id = doc.add_object(font);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 760.into()]),
        ];
        for (i, line) in lines.into_iter().enumerate() {
            if i > 0 {
                operations.push(Operation::new("Td", vec![0.into(), (-14).into()]));
            }
            operations.push(Operation::new("Tj", vec![line]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let encoded = content.encode().unwrap_or_default();
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    save(&mut doc)
}
