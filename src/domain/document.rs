// ============================================================
// Layer 3 — Document Domain Type
// ============================================================
// The raw extracted text of one uploaded file, already tagged
// with page markers, plus whatever metadata the file carried.
//
// Page marker format:
//   "[Page 1]\n<text of page 1>\n\n[Page 2]\n<text of page 2>"
//
// The marker is the only citation handle that survives
// normalisation and chunking, so it is built in exactly one
// place (`page_marker`) and recognised in exactly one place
// (`PAGE_MARKER`).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches a page marker such as `[Page 12]`.
pub static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[Page (\d+)\]").expect("page marker pattern is valid"));

/// Placeholder text used when a single page cannot be extracted.
pub const EXTRACTION_FAILED: &str = "Text extraction failed for this page.";

/// Render the marker for a 1-based page number.
pub fn page_marker(page: usize) -> String {
    format!("[Page {page}]")
}

/// Optional descriptive fields read from the source file.
/// Opaque to the pipeline, only displayed to the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    pub page_count: usize,
}

impl DocumentMetadata {
    /// (label, value) pairs for every field that is present.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let fields = [
            ("Title", &self.title),
            ("Author", &self.author),
            ("Subject", &self.subject),
            ("Creator", &self.creator),
            ("Producer", &self.producer),
        ];
        for (label, value) in fields {
            if let Some(v) = value {
                out.push((label, v.clone()));
            }
        }
        out.push(("Page count", self.page_count.to_string()));
        out
    }
}

/// A document as the pipeline sees it: page-marked plain text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// File name the text came from
    pub source: String,

    /// Page-marked text, before normalisation
    pub text: String,

    /// Metadata, when the format provides any
    pub metadata: Option<DocumentMetadata>,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source:   source.into(),
            text:     text.into(),
            metadata: None,
        }
    }

    /// Assemble a document from per-page texts, inserting one
    /// marker per page (1-based) and a blank line between pages.
    pub fn from_pages<I, S>(source: impl Into<String>, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let text = pages
            .into_iter()
            .enumerate()
            .map(|(i, page)| format!("{}\n{}", page_marker(i + 1), page.as_ref()))
            .collect::<Vec<_>>()
            .join("\n\n");
        Self::new(source, text)
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Number of page markers in the text.
    pub fn page_count(&self) -> usize {
        PAGE_MARKER.find_iter(&self.text).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pages_inserts_one_marker_per_page() {
        let doc = Document::from_pages("a.pdf", ["first page", "second page"]);
        assert_eq!(doc.text, "[Page 1]\nfirst page\n\n[Page 2]\nsecond page");
        assert_eq!(doc.page_count(), 2);
    }

    #[test]
    fn marker_pattern_captures_page_number() {
        let caps = PAGE_MARKER.captures("see [Page 42] here").unwrap();
        assert_eq!(&caps[1], "42");
        assert_eq!(page_marker(42), "[Page 42]");
    }

    #[test]
    fn metadata_entries_skip_missing_fields() {
        let meta = DocumentMetadata {
            title: Some("Annual Report".into()),
            page_count: 3,
            ..Default::default()
        };
        let entries = meta.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("Title", "Annual Report".to_string()));
        assert_eq!(entries[1], ("Page count", "3".to_string()));
    }
}
