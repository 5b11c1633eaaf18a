// ============================================================
// Layer 4 — Document Loaders
// ============================================================
// Turns an uploaded file into page-marked plain text.
//
//   .pdf        → lopdf, one extraction per page, Info metadata
//   .docx       → docx-rs paragraph walk, treated as one page
//   .txt / .md  → form feeds (\x0c) separate pages
//
// A page that fails to extract is replaced with a placeholder
// and logged; one bad page never aborts the whole document.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use lopdf::{Dictionary, Object};

use crate::domain::document::{Document, DocumentMetadata, EXTRACTION_FAILED};
use crate::domain::traits::DocumentSource;

/// Read a file from disk and extract it with the loader that
/// matches its extension.
pub fn load_path(path: &Path) -> Result<Document> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let doc = match ext.as_str() {
        "pdf"                   => PdfLoader.extract(&bytes, &source)?,
        "docx"                  => DocxLoader.extract(&bytes, &source)?,
        "txt" | "md" | "markdown" => TextLoader.extract(&bytes, &source)?,
        other => anyhow::bail!("Unsupported file type: .{other}"),
    };

    tracing::info!(
        "Loaded '{}' ({} pages, {} chars)",
        doc.source,
        doc.page_count(),
        doc.text.len()
    );
    Ok(doc)
}

// ─── PDF ──────────────────────────────────────────────────────────────────────
pub struct PdfLoader;

impl DocumentSource for PdfLoader {
    fn extract(&self, bytes: &[u8], source: &str) -> Result<Document> {
        let pdf = lopdf::Document::load_mem(bytes)
            .with_context(|| format!("Cannot parse PDF '{source}'"))?;

        let page_numbers: Vec<u32> = pdf.get_pages().keys().copied().collect();

        let pages: Vec<String> = page_numbers
            .iter()
            .map(|&n| match pdf.extract_text(&[n]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("'{}': page {} could not be extracted: {}", source, n, e);
                    EXTRACTION_FAILED.to_string()
                }
            })
            .collect();

        let mut metadata = read_info(&pdf).unwrap_or_default();
        metadata.page_count = pages.len();

        Ok(Document::from_pages(source, pages).with_metadata(metadata))
    }
}

/// Read the trailer's Info dictionary. Missing or malformed
/// metadata is not an error; the caller falls back to defaults.
fn read_info(pdf: &lopdf::Document) -> Option<DocumentMetadata> {
    let info = match pdf.trailer.get(b"Info").ok()? {
        Object::Reference(id) => pdf.get_object(*id).ok()?.as_dict().ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };

    Some(DocumentMetadata {
        title:      info_field(info, b"Title"),
        author:     info_field(info, b"Author"),
        subject:    info_field(info, b"Subject"),
        creator:    info_field(info, b"Creator"),
        producer:   info_field(info, b"Producer"),
        page_count: 0,
    })
}

fn info_field(info: &Dictionary, key: &[u8]) -> Option<String> {
    match info.get(key).ok()? {
        Object::String(bytes, _) => {
            let value = decode_pdf_string(bytes);
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        }
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE when it carries a BOM,
/// UTF-8 with BOM, otherwise PDFDocEncoding (Latin-1 superset).
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

// ─── DOCX ─────────────────────────────────────────────────────────────────────
/// Word documents have no fixed pagination; the whole body is page 1.
pub struct DocxLoader;

impl DocumentSource for DocxLoader {
    fn extract(&self, bytes: &[u8], source: &str) -> Result<Document> {
        use docx_rs::DocumentChild;

        let docx = docx_rs::read_docx(bytes)
            .map_err(|e| anyhow::anyhow!("docx-rs parse error in '{}': {:?}", source, e))?;

        let paragraphs: Vec<String> = docx
            .document
            .children
            .iter()
            .filter_map(|child| match child {
                DocumentChild::Paragraph(para) => Some(extract_paragraph_text(para)),
                _ => None,
            })
            .filter(|text| !text.trim().is_empty())
            .collect();

        let metadata = DocumentMetadata { page_count: 1, ..Default::default() };
        Ok(Document::from_pages(source, [paragraphs.join("\n")]).with_metadata(metadata))
    }
}

/// Paragraph → Run → Text; runs are parts of the same sentence
/// so they are concatenated with no separator.
fn extract_paragraph_text(para: &docx_rs::Paragraph) -> String {
    use docx_rs::{ParagraphChild, RunChild};

    let mut parts = Vec::new();
    for child in &para.children {
        if let ParagraphChild::Run(run) = child {
            for rc in &run.children {
                if let RunChild::Text(t) = rc {
                    parts.push(t.text.clone());
                }
            }
        }
    }
    parts.join("")
}

// ─── Plain text ───────────────────────────────────────────────────────────────
/// Text exported by `pdftotext` separates pages with form feeds.
pub struct TextLoader;

impl DocumentSource for TextLoader {
    fn extract(&self, bytes: &[u8], source: &str) -> Result<Document> {
        let text = String::from_utf8_lossy(bytes);

        let mut pages: Vec<&str> = text.split('\x0c').collect();
        // A trailing form feed closes the last page, it does not open a new one
        if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
            pages.pop();
        }

        let metadata = DocumentMetadata { page_count: pages.len(), ..Default::default() };
        Ok(Document::from_pages(source, pages).with_metadata(metadata))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_loader_splits_on_form_feed() {
        let doc = TextLoader.extract(b"first\x0csecond\x0c", "notes.txt").unwrap();
        assert_eq!(doc.text, "[Page 1]\nfirst\n\n[Page 2]\nsecond");
        assert_eq!(doc.metadata.unwrap().page_count, 2);
    }

    #[test]
    fn test_text_loader_single_page() {
        let doc = TextLoader.extract(b"just text", "a.md").unwrap();
        assert_eq!(doc.text, "[Page 1]\njust text");
        assert_eq!(doc.source, "a.md");
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode_pdf_string(b"Caf\xe9"), "Café");
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_pdf_string(&bytes), "Hi");
    }

    #[test]
    fn test_decode_utf8_with_bom() {
        assert_eq!(decode_pdf_string("\u{feff}Grüße".as_bytes()), "Grüße");
    }

    #[test]
    fn test_invalid_pdf_is_an_error() {
        assert!(PdfLoader.extract(b"not a pdf", "x.pdf").is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("slides.pptx");
        fs::write(&path, b"whatever").unwrap();
        let err = load_path(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported file type"));
    }

    #[test]
    fn test_load_path_reads_text_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("manual.txt");
        fs::write(&path, "page one\x0cpage two").unwrap();
        let doc = load_path(&path).unwrap();
        assert_eq!(doc.source, "manual.txt");
        assert_eq!(doc.page_count(), 2);
    }
}
