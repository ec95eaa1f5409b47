//! Format-specific extraction backends (PDF, DOCX, plain text, Markdown).
//!
//! Each backend takes a file path plus optional configuration and returns
//! the file's content as one or more [`ExtractedUnit`]s. Backends are black
//! boxes to the rest of the pipeline: any error here is caught by the loader
//! and treated as a skip for that file, never a batch failure.

use std::io::Read;
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// One logical unit of extracted content: a page for paginated formats, the
/// whole file for flat ones.
#[derive(Debug, Clone)]
pub struct ExtractedUnit {
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl ExtractedUnit {
    fn plain(content: String) -> Self {
        Self {
            content,
            metadata: Map::new(),
        }
    }
}

/// Per-file backend failure. Swallowed by the loader (logged, file skipped).
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("text decoding failed: {0}")]
    Encoding(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Encoding configuration for text-like formats. Binary formats (PDF, DOCX)
/// take no encoding parameter.
#[derive(Debug, Clone)]
pub struct TextConfig {
    pub encoding: String,
    pub autodetect_encoding: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            encoding: "utf-8".to_string(),
            autodetect_encoding: true,
        }
    }
}

/// Extracts one unit per page from a PDF. Page numbers are zero-based.
pub fn extract_pdf(path: &Path) -> Result<Vec<ExtractedUnit>, ExtractError> {
    let bytes = std::fs::read(path)?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(page, text)| {
            let mut metadata = Map::new();
            metadata.insert("page".to_string(), Value::from(page));
            ExtractedUnit {
                content: text,
                metadata,
            }
        })
        .collect())
}

/// Extracts the concatenated `<w:t>` runs of `word/document.xml` from a DOCX
/// archive as a single unit, with a newline per paragraph.
pub fn extract_docx(path: &Path) -> Result<Vec<ExtractedUnit>, ExtractError> {
    let bytes = std::fs::read(path)?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice()))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
        if entry.name() == "word/document.xml" {
            entry
                .take(MAX_XML_ENTRY_BYTES)
                .read_to_end(&mut doc_xml)
                .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
            if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
                return Err(ExtractError::Ooxml(
                    "word/document.xml exceeds size limit".to_string(),
                ));
            }
            found = true;
            break;
        }
    }
    if !found {
        return Err(ExtractError::Ooxml(
            "word/document.xml not found".to_string(),
        ));
    }
    let text = extract_w_t_elements(&doc_xml)?;
    Ok(vec![ExtractedUnit::plain(text)])
}

fn extract_w_t_elements(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                // paragraph boundary
                if e.local_name().as_ref() == b"p" && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Reads a plain-text or Markdown file as a single unit using the given
/// encoding configuration.
pub fn extract_text_file(path: &Path, config: &TextConfig) -> Result<Vec<ExtractedUnit>, ExtractError> {
    Ok(vec![ExtractedUnit::plain(read_text(path, config)?)])
}

fn read_text(path: &Path, config: &TextConfig) -> Result<String, ExtractError> {
    if !config.encoding.eq_ignore_ascii_case("utf-8") {
        return Err(ExtractError::Encoding(format!(
            "unsupported encoding '{}' (only utf-8 is supported)",
            config.encoding
        )));
    }
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) if config.autodetect_encoding => {
            warn!(path = %path.display(), "invalid utf-8, falling back to lossy decoding");
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
        Err(e) => Err(ExtractError::Encoding(format!(
            "{}: {}",
            path.display(),
            e.utf8_error()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_text(paragraphs: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            let body: String = paragraphs
                .iter()
                .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
                .collect();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
                body
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        let err = extract_pdf(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.docx");
        std::fs::write(&path, b"not a zip").unwrap();
        let err = extract_docx(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn docx_paragraphs_joined_with_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.docx");
        std::fs::write(&path, docx_with_text(&["first para", "second para"])).unwrap();
        let units = extract_docx(&path).unwrap();
        assert_eq!(units.len(), 1);
        assert!(units[0].content.contains("first para"));
        assert!(units[0].content.contains("second para"));
        assert!(units[0].content.contains('\n'));
    }

    #[test]
    fn text_strict_utf8_rejects_invalid_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, [0x63, 0x61, 0x66, 0xe9]).unwrap();
        let strict = TextConfig {
            encoding: "utf-8".to_string(),
            autodetect_encoding: false,
        };
        assert!(matches!(
            extract_text_file(&path, &strict).unwrap_err(),
            ExtractError::Encoding(_)
        ));

        let lenient = TextConfig::default();
        let units = extract_text_file(&path, &lenient).unwrap();
        assert!(units[0].content.starts_with("caf"));
    }
}
