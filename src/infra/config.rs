// ============================================================
// Layer 6 — Configuration
// ============================================================
// All tunables for one run, grouped by the component that reads
// them. Serialisable so a run can be described by a JSON file:
//
//   {
//     "chunking":   { "chunk_size": 400, "overlap": 80 },
//     "retrieval":  { "top_k": 4 },
//     "generation": { "provider": "chat", "base_url": "http://127.0.0.1:8080/v1" }
//   }
//
// Missing sections and fields fall back to `Default`. CLI flags
// and PDF_QA_* environment variables override the file (see
// cli::commands::ConfigArgs). API keys are never read from or
// written to the file.

use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::chunker::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use crate::domain::error::RagError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunking:      ChunkingConfig,
    pub retrieval:     RetrievalConfig,
    pub embedding:     EmbeddingConfig,
    pub generation:    GenerationConfig,
    pub transcription: TranscriptionConfig,
    pub speech:        SpeechConfig,
    /// Bearer token for the HTTP providers (PDF_QA_API_KEY only)
    #[serde(skip)]
    pub api_key:       Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Words per chunk
    pub chunk_size:    usize,
    /// Words shared by consecutive chunks of a page
    pub overlap:       usize,
    pub respect_pages: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size:    DEFAULT_CHUNK_SIZE,
            overlap:       DEFAULT_OVERLAP,
            respect_pages: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k:             usize,
    /// Hard character budget for the context handed to the generator
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3, max_context_chars: 4000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Offline feature-hashing embedder
    Hashing,
    /// OpenAI-compatible /embeddings endpoint
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider:           EmbedderKind,
    pub model:              String,
    /// Output width of the hashing embedder
    pub dimensions:         usize,
    /// Width asked of the HTTP provider; omitted from the request when unset
    pub request_dimensions: Option<usize>,
    /// Pretrained tokenizer.json used by the hashing embedder
    pub tokenizer_path:     Option<PathBuf>,
    pub base_url:           Option<String>,
    pub batch_size:         usize,
    pub max_retries:        usize,
    pub timeout_secs:       u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider:           EmbedderKind::Hashing,
            model:              "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimensions:         384,
            request_dimensions: None,
            tokenizer_path:     None,
            base_url:           None,
            batch_size:         64,
            max_retries:        3,
            timeout_secs:       60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// Offline sentence extraction from the context
    Extractive,
    /// OpenAI-compatible /chat/completions with system/user roles
    Chat,
    /// OpenAI-compatible /completions with a flat prompt
    Completion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider:       GeneratorKind,
    pub model:          String,
    pub base_url:       Option<String>,
    pub max_new_tokens: usize,
    pub temperature:    f32,
    pub timeout_secs:   u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider:       GeneratorKind::Extractive,
            model:          "TinyLlama/TinyLlama-1.1B-Chat-v1.0".to_string(),
            base_url:       None,
            max_new_tokens: 512,
            temperature:    0.2,
            timeout_secs:   120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub model:        String,
    /// OpenAI-compatible server exposing /audio/transcriptions
    pub base_url:     Option<String>,
    pub language:     Option<String>,
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model:        "small".to_string(),
            base_url:     None,
            language:     None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled:    bool,
    /// Text-to-speech program, invoked as
    /// `<program> -s <rate> -a <amp> [-v <voice>] -w <out.wav> --stdin`
    /// with the answer text written to its stdin
    pub program:    String,
    pub rate_wpm:   u32,
    /// 0.0 – 1.0
    pub volume:     f32,
    pub voice:      Option<String>,
    pub output_dir: PathBuf,
    /// Oldest answers are evicted beyond this many files
    pub max_files:  usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled:    true,
            program:    "espeak-ng".to_string(),
            rate_wpm:   175,
            volume:     1.0,
            voice:      None,
            output_dir: PathBuf::from("outputs/audio"),
            max_files:  32,
        }
    }
}

impl RagConfig {
    /// Load a JSON config file; absent fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&json)
            .with_context(|| format!("Invalid config file '{}'", path.display()))?;
        tracing::debug!("Loaded config from '{}'", path.display());
        Ok(cfg)
    }

    /// Reject settings that would make the pipeline loop, divide
    /// by zero or call an endpoint that does not exist.
    pub fn validate(&self) -> Result<(), RagError> {
        let fail = |msg: String| Err(RagError::InvalidConfig(msg));

        let c = &self.chunking;
        if c.chunk_size == 0 {
            return fail("chunking.chunk_size must be greater than zero".into());
        }
        if c.overlap >= c.chunk_size {
            return fail(format!(
                "chunking.overlap ({}) must be less than chunking.chunk_size ({})",
                c.overlap, c.chunk_size
            ));
        }
        if self.retrieval.top_k == 0 {
            return fail("retrieval.top_k must be at least 1".into());
        }
        if self.retrieval.max_context_chars == 0 {
            return fail("retrieval.max_context_chars must be greater than zero".into());
        }

        let e = &self.embedding;
        if e.dimensions == 0 {
            return fail("embedding.dimensions must be greater than zero".into());
        }
        if e.request_dimensions == Some(0) {
            return fail("embedding.request_dimensions must be greater than zero when set".into());
        }
        if e.batch_size == 0 {
            return fail("embedding.batch_size must be greater than zero".into());
        }
        if e.provider == EmbedderKind::Http && e.base_url.is_none() {
            return fail("embedding.base_url is required for the http provider".into());
        }

        let g = &self.generation;
        if !(0.0..=2.0).contains(&g.temperature) {
            return fail(format!("generation.temperature ({}) must be within 0.0..=2.0", g.temperature));
        }
        if g.max_new_tokens == 0 {
            return fail("generation.max_new_tokens must be greater than zero".into());
        }
        if g.provider != GeneratorKind::Extractive && g.base_url.is_none() {
            return fail("generation.base_url is required for the chat and completion providers".into());
        }

        let s = &self.speech;
        if !(0.0..=1.0).contains(&s.volume) {
            return fail(format!("speech.volume ({}) must be within 0.0..=1.0", s.volume));
        }
        if s.max_files == 0 {
            return fail("speech.max_files must be greater than zero".into());
        }

        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = RagConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.chunking.chunk_size, 600);
        assert_eq!(cfg.chunking.overlap, 120);
        assert_eq!(cfg.retrieval.top_k, 3);
        assert_eq!(cfg.retrieval.max_context_chars, 4000);
        assert_eq!(cfg.generation.max_new_tokens, 512);
    }

    #[test]
    fn test_overlap_not_below_chunk_size_is_rejected() {
        let mut cfg = RagConfig::default();
        cfg.chunking.chunk_size = 100;
        cfg.chunking.overlap    = 100;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(ref m) if m.contains("overlap")));
    }

    #[test]
    fn test_http_providers_need_base_url() {
        let mut cfg = RagConfig::default();
        cfg.generation.provider = GeneratorKind::Chat;
        assert!(cfg.validate().is_err());
        cfg.generation.base_url = Some("http://localhost:8080/v1".into());
        assert!(cfg.validate().is_ok());

        cfg.embedding.provider = EmbedderKind::Http;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let mut cfg = RagConfig::default();
        cfg.generation.temperature = 3.5;
        assert!(cfg.validate().is_err());

        let mut cfg = RagConfig::default();
        cfg.speech.volume = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = RagConfig::default();
        cfg.retrieval.top_k = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.json");
        fs::write(
            &path,
            r#"{ "chunking": { "chunk_size": 200 }, "generation": { "provider": "chat", "base_url": "http://x/v1" } }"#,
        )
        .unwrap();

        let cfg = RagConfig::load(&path).unwrap();
        assert_eq!(cfg.chunking.chunk_size, 200);
        assert_eq!(cfg.chunking.overlap, 120);
        assert_eq!(cfg.generation.provider, GeneratorKind::Chat);
        assert_eq!(cfg.retrieval.top_k, 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(RagConfig::load(&path).is_err());
    }
}
