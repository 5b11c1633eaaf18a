// ============================================================
// Layer 3 — Core Traits (Boundaries)
// ============================================================
// The pipeline only ever talks to models and loaders through
// these traits. Concrete implementations live in Layer 4
// (loaders) and Layer 5 (models); tests substitute fakes.
//
// Every model trait is Send + Sync so one instance can be shared
// by the session for the lifetime of the process.

use std::path::Path;

use anyhow::Result;

use crate::domain::document::Document;

// ─── DocumentSource ───────────────────────────────────────────────────────────
/// Turns an uploaded file's bytes into page-marked text.
pub trait DocumentSource {
    /// Extract a document; `source` is the file name to record.
    fn extract(&self, bytes: &[u8], source: &str) -> Result<Document>;
}

// ─── Embedder ─────────────────────────────────────────────────────────────────
/// Maps texts to vectors of one fixed width per instance.
pub trait Embedder: Send + Sync {
    /// One row per input, in input order.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Model identifier, for logging.
    fn model_id(&self) -> &str;
}

// ─── AnswerGenerator ──────────────────────────────────────────────────────────
/// Everything a generator needs for one grounded answer.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Instruction constraining the model to the context
    pub system:         &'a str,
    pub question:       &'a str,
    /// Retrieved context, already truncated to the character budget
    pub context:        &'a str,
    pub max_new_tokens: usize,
    pub temperature:    f32,
}

pub trait AnswerGenerator: Send + Sync {
    /// Return only the answer text.
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;
}

// ─── Transcriber ──────────────────────────────────────────────────────────────
pub trait Transcriber: Send + Sync {
    /// Transcribe a recorded clip. An empty string means the
    /// engine heard no speech; that is not an error.
    fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

// ─── SpeechSynthesizer ────────────────────────────────────────────────────────
pub trait SpeechSynthesizer: Send + Sync {
    /// Write spoken `text` as a playable audio file at `out`.
    fn synthesize(&self, text: &str, out: &Path) -> Result<()>;
}
