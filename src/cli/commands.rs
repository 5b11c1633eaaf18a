// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands (`index`, `ask`, `chat`) and the
// global configuration flags shared by all of them.
//
// Configuration precedence, lowest to highest:
//   1. Built-in defaults           (RagConfig::default)
//   2. JSON file                   (--config / PDF_QA_CONFIG)
//   3. Flags or PDF_QA_* variables (clap `env`)
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f32, etc.)

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Args, Subcommand};

use crate::infra::config::RagConfig;

/// Environment variable holding the bearer token for HTTP providers.
pub const API_KEY_ENV: &str = "PDF_QA_API_KEY";

/// The three top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and index a document, then print what was indexed
    Index(IndexArgs),

    /// Answer one question (typed or recorded) about a document
    Ask(AskArgs),

    /// Interactive question/answer session on stdin
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Document to index (.pdf, .docx, .txt, .md)
    #[arg(long)]
    pub file: PathBuf,

    /// Print every chunk after indexing
    #[arg(long)]
    pub show_chunks: bool,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("query").required(true).args(["question", "audio"])))]
pub struct AskArgs {
    /// Document to answer from
    #[arg(long)]
    pub file: PathBuf,

    /// The natural language question to answer
    #[arg(long)]
    pub question: Option<String>,

    /// Recorded question (WAV) to transcribe instead
    #[arg(long)]
    pub audio: Option<PathBuf>,

    /// Also speak the answer into the audio output directory
    #[arg(long)]
    pub speak: bool,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Document to start the session with
    #[arg(long)]
    pub file: PathBuf,

    /// Speak every answer
    #[arg(long)]
    pub speak: bool,
}

/// Flags that override the configuration file. Every one is
/// global, so it may appear before or after the subcommand.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// JSON configuration file
    #[arg(long, global = true, env = "PDF_QA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Words per chunk
    #[arg(long, global = true, env = "PDF_QA_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Words shared by consecutive chunks; must be below --chunk-size
    #[arg(long, global = true, env = "PDF_QA_OVERLAP")]
    pub overlap: Option<usize>,

    /// Number of chunks retrieved per question
    #[arg(long, global = true, env = "PDF_QA_TOP_K")]
    pub top_k: Option<usize>,

    /// Character budget for the context given to the generator
    #[arg(long, global = true, env = "PDF_QA_MAX_CONTEXT_CHARS")]
    pub max_context_chars: Option<usize>,

    /// Upper bound on generated answer length, in tokens
    #[arg(long, global = true, env = "PDF_QA_MAX_NEW_TOKENS")]
    pub max_new_tokens: Option<usize>,

    /// Sampling temperature for the generator (0.0 – 2.0)
    #[arg(long, global = true, env = "PDF_QA_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// Embedding model name sent to the embedding provider
    #[arg(long, global = true, env = "PDF_QA_EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    /// Let chunks run across page boundaries
    #[arg(
        long,
        global = true,
        env = "PDF_QA_NO_RESPECT_PAGES",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_respect_pages: bool,
}

impl ConfigArgs {
    /// Merge defaults, the config file, flags and the API key
    /// into one validated configuration.
    pub fn resolve(&self) -> Result<RagConfig> {
        let mut cfg = match &self.config {
            Some(path) => RagConfig::load(path)?,
            None       => RagConfig::default(),
        };

        if let Some(v) = self.chunk_size        { cfg.chunking.chunk_size = v; }
        if let Some(v) = self.overlap           { cfg.chunking.overlap = v; }
        if let Some(v) = self.top_k             { cfg.retrieval.top_k = v; }
        if let Some(v) = self.max_context_chars { cfg.retrieval.max_context_chars = v; }
        if let Some(v) = self.max_new_tokens    { cfg.generation.max_new_tokens = v; }
        if let Some(v) = self.temperature       { cfg.generation.temperature = v; }
        if let Some(v) = &self.embedding_model  { cfg.embedding.model = v.clone(); }
        if self.no_respect_pages                { cfg.chunking.respect_pages = false; }

        cfg.api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty());

        cfg.validate()?;
        Ok(cfg)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::RagError;
    use std::fs;

    #[test]
    fn test_no_overrides_gives_defaults() {
        let cfg = ConfigArgs::default().resolve().unwrap();
        assert_eq!(cfg.chunking.chunk_size, 600);
        assert_eq!(cfg.retrieval.top_k, 3);
        assert!(cfg.chunking.respect_pages);
    }

    #[test]
    fn test_flags_override_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.json");
        fs::write(&path, r#"{ "chunking": { "chunk_size": 300, "overlap": 50 }, "retrieval": { "top_k": 5 } }"#)
            .unwrap();

        let args = ConfigArgs {
            config:           Some(path),
            top_k:            Some(2),
            no_respect_pages: true,
            ..Default::default()
        };
        let cfg = args.resolve().unwrap();
        assert_eq!(cfg.chunking.chunk_size, 300);
        assert_eq!(cfg.chunking.overlap, 50);
        assert_eq!(cfg.retrieval.top_k, 2);
        assert!(!cfg.chunking.respect_pages);
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let args = ConfigArgs {
            chunk_size: Some(100),
            overlap:    Some(100),
            ..Default::default()
        };
        let err = args.resolve().unwrap_err();
        assert!(matches!(err.downcast_ref::<RagError>(), Some(RagError::InvalidConfig(_))));
    }
}
