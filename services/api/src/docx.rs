//! services/api/src/docx.rs
//!
//! Plain-text extraction from DOCX files. A DOCX is a zip container whose
//! body lives in `word/document.xml`; the text of every paragraph (`w:p`)
//! is concatenated in document order, separated by newlines. Formatting,
//! tables, headers and footers are ignored.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

#[derive(Debug, thiserror::Error)]
pub enum DocxError {
    #[error("Not a valid DOCX container: {0}")]
    Container(#[from] zip::result::ZipError),
    #[error("Failed to read document body: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse document XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Extracts the paragraph text of a DOCX document.
pub fn extract_text(docx_bytes: &[u8]) -> Result<String, DocxError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(docx_bytes))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text_run = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"w:t" => in_text_run = in_paragraph,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => {
                    in_paragraph = false;
                    paragraphs.push(std::mem::take(&mut current));
                }
                b"w:t" => in_text_run = false,
                _ => {}
            },
            Event::Text(t) => {
                if in_text_run {
                    current.push_str(&t.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}
