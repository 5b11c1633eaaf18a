// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from an uploaded file to the ordered list of
// chunks that gets embedded:
//
//   .pdf / .docx / .txt
//       │
//       ▼
//   loader          → page-marked text + metadata
//       │
//       ▼
//   preprocessor    → whitespace cleanup, dehyphenation
//       │
//       ▼
//   chunker         → overlapping word windows per page
//
// Each step is a plain function of its input, so each one is
// tested on its own.

/// Extracts page-marked text from PDF, DOCX and plain text files
pub mod loader;

/// Cleans and normalises raw extracted text
pub mod preprocessor;

/// Splits text into overlapping, page-respecting chunks
pub mod chunker;
