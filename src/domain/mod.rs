// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain structs, traits and error types that describe what the
// system works with: a page-marked document, a chat turn, and
// the boundaries to the external models.
//
// Rules for this layer:
//   - NO HTTP, file I/O or tensor code
//   - Only plain Rust types and traits
//
// Everything that talks to a model or a file implements one of
// the traits in `traits.rs` somewhere in Layer 4 or 5.

// A loaded document with page markers and metadata
pub mod document;

// One question/answer exchange in the session history
pub mod chat;

// Domain failures the caller can tell apart
pub mod error;

// Boundaries to the embedding, generation and speech engines
pub mod traits;
