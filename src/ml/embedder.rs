// ============================================================
// Layer 5 — Embedding Providers
// ============================================================
// Two implementations of the Embedder trait:
//
//   HashingEmbedder — offline, deterministic. Text goes through
//     BERT-style normalisation (lowercase, accent/control cleanup)
//     and pre-tokenisation (whitespace + punctuation split) from
//     the `tokenizers` crate, or through a pretrained
//     tokenizer.json when one is configured. Every unigram and
//     bigram is hashed (CRC-32) into one of `dimensions` buckets
//     with a sign taken from the hash, so unrelated features
//     cancel out on average instead of piling up.
//
//   HttpEmbedder — any OpenAI-compatible /embeddings endpoint,
//     batched, with retry and exponential backoff on rate limits,
//     server errors and transport failures.
//
// Neither normalises its output; the vector index does that.

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crc32fast::Hasher as Crc32;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokenizers::normalizers::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::{
    NormalizedString, Normalizer, OffsetReferential, OffsetType, PreTokenizedString,
    PreTokenizer, Tokenizer,
};

use crate::domain::error::RagError;
use crate::domain::traits::Embedder;
use crate::infra::config::EmbeddingConfig;
use crate::ml::http::{build_client, endpoint, status_error};

const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT:  f32 = 0.5;

// ─── HashingEmbedder ──────────────────────────────────────────────────────────
enum Tokenization {
    Bert(BertNormalizer),
    Pretrained(Box<Tokenizer>),
}

pub struct HashingEmbedder {
    model_id:     String,
    dimensions:   usize,
    tokenization: Tokenization,
}

impl HashingEmbedder {
    /// BERT-style tokenisation, `dimensions` output buckets.
    pub fn new(dimensions: usize) -> Result<Self> {
        anyhow::ensure!(dimensions > 0, "embedding dimensions must be greater than zero");
        Ok(Self {
            model_id:     format!("hashing-{dimensions}"),
            dimensions,
            tokenization: Tokenization::Bert(BertNormalizer::default()),
        })
    }

    /// Tokenise with a HuggingFace tokenizer.json instead.
    pub fn with_tokenizer_file(dimensions: usize, path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e)
        })?;
        let mut embedder = Self::new(dimensions)?;
        embedder.tokenization = Tokenization::Pretrained(Box::new(tokenizer));
        embedder.model_id = format!("hashing-{dimensions}+{}", path.display());
        Ok(embedder)
    }

    pub fn from_config(cfg: &EmbeddingConfig) -> Result<Self> {
        match &cfg.tokenizer_path {
            Some(path) => Self::with_tokenizer_file(cfg.dimensions, path),
            None       => Self::new(cfg.dimensions),
        }
    }

    fn tokens(&self, text: &str) -> Result<Vec<String>> {
        match &self.tokenization {
            Tokenization::Bert(normalizer) => {
                let mut normalized = NormalizedString::from(text);
                normalizer
                    .normalize(&mut normalized)
                    .map_err(|e| anyhow::anyhow!("Normalisation error: {e}"))?;

                let mut pretokenized = PreTokenizedString::from(normalized);
                BertPreTokenizer
                    .pre_tokenize(&mut pretokenized)
                    .map_err(|e| anyhow::anyhow!("Pre-tokenisation error: {e}"))?;

                Ok(pretokenized
                    .get_splits(OffsetReferential::Original, OffsetType::Byte)
                    .into_iter()
                    .map(|(piece, _, _)| piece)
                    // Punctuation-only pieces carry no meaning
                    .filter(|piece| piece.chars().any(char::is_alphanumeric))
                    .map(str::to_string)
                    .collect())
            }
            Tokenization::Pretrained(tokenizer) => {
                let enc = tokenizer
                    .encode(text, false)
                    .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
                Ok(enc.get_tokens().to_vec())
            }
        }
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let tokens     = self.tokens(text)?;
        let mut vector = vec![0f32; self.dimensions];

        for token in &tokens {
            self.add_feature(&mut vector, token.as_bytes(), UNIGRAM_WEIGHT);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut vector, bigram.as_bytes(), BIGRAM_WEIGHT);
        }

        Ok(vector)
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let mut hasher = Crc32::new();
        hasher.update(feature);
        let hash   = hasher.finalize();
        let bucket = hash as usize % self.dimensions;
        let sign   = if hash & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ─── HttpEmbedder ─────────────────────────────────────────────────────────────
/// Blocking client for OpenAI-compatible embedding endpoints.
pub struct HttpEmbedder {
    client:      Client,
    endpoint:    String,
    model:       String,
    dimensions:  Option<usize>,
    max_retries: usize,
    batch_size:  usize,
}

impl HttpEmbedder {
    pub fn new(
        api_key:     Option<String>,
        base_url:    String,
        model:       String,
        dimensions:  Option<usize>,
        timeout:     Duration,
        max_retries: usize,
        batch_size:  usize,
    ) -> Result<Self> {
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        anyhow::ensure!(batch_size > 0, "embedding batch size must be greater than zero");
        let client = build_client(api_key.as_deref(), timeout, "embeddings")?;
        Ok(Self {
            client,
            endpoint: endpoint(&base_url, "embeddings"),
            model,
            dimensions,
            max_retries: max_retries.max(1),
            batch_size,
        })
    }

    /// `dimensions` is only sent when `request_dimensions` is set;
    /// many models reject the parameter.
    pub fn from_config(api_key: Option<String>, cfg: &EmbeddingConfig) -> Result<Self> {
        let base_url = cfg
            .base_url
            .clone()
            .ok_or(RagError::NotConfigured("embedding.base_url"))?;
        Self::new(
            api_key,
            base_url,
            cfg.model.clone(),
            cfg.request_dimensions,
            Duration::from_secs(cfg.timeout_secs),
            cfg.max_retries,
            cfg.batch_size,
        )
    }

    fn request<'a>(&'a self, inputs: &'a [&'a str]) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            model:      &self.model,
            input:      inputs,
            dimensions: self.dimensions,
        }
    }

    /// Sends one batch and returns vectors in input order.
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0usize;
        loop {
            let request = self.request(inputs);
            match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = resp
                            .json()
                            .context("failed to parse embedding response")?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        anyhow::ensure!(
                            parsed.data.len() == inputs.len(),
                            "embedding server returned {} vectors for {} inputs",
                            parsed.data.len(),
                            inputs.len()
                        );
                        return Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect());
                    }
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::warn!("Embedding request got {}, retry {}", status, attempt);
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(status_error(resp, "embedding server"));
                }
                Err(err) => {
                    if (err.is_timeout() || err.is_connect()) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::warn!("Embedding request failed ({}), retry {}", err, attempt);
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(err).context("failed to call embedding server");
                }
            }
        }
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            tracing::debug!("Embedding batch of {}", batch.len());
            out.extend(self.embed_batch(batch)?);
        }
        Ok(out)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index:     usize,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32  = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32  = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (na * nb)
    }

    #[test]
    fn test_fixed_width_and_one_row_per_input() {
        let e    = HashingEmbedder::new(64).unwrap();
        let rows = e.embed(&["alpha beta", "", "gamma"]).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 64));
        // No tokens → all-zero vector
        assert!(rows[1].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_deterministic() {
        let e = HashingEmbedder::new(128).unwrap();
        let a = e.embed(&["The cat sat on the mat."]).unwrap();
        let b = e.embed(&["The cat sat on the mat."]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let e = HashingEmbedder::new(128).unwrap();
        let rows = e.embed(&["Dogs bark loudly!", "dogs bark loudly"]).unwrap();
        assert_eq!(rows[0], rows[1]);
    }

    #[test]
    fn test_shared_words_score_higher() {
        let e    = HashingEmbedder::new(384).unwrap();
        let rows = e
            .embed(&[
                "quarterly revenue grew in the northern region",
                "revenue grew in the northern region this quarter",
                "the committee approved a new parking policy",
            ])
            .unwrap();
        assert!(cosine(&rows[0], &rows[1]) > cosine(&rows[0], &rows[2]));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert!(retry_backoff(1) < retry_backoff(2));
        assert_eq!(retry_backoff(5), retry_backoff(9));
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry(StatusCode::BAD_GATEWAY));
        assert!(!should_retry(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_dimensions_sent_only_when_requested() {
        let mut cfg = EmbeddingConfig {
            base_url: Some("http://localhost:8080/v1".into()),
            model:    "text-embedding-ada-002".into(),
            ..Default::default()
        };
        let inputs = ["hello"];

        let plain = HttpEmbedder::from_config(None, &cfg).unwrap();
        let body  = serde_json::to_value(plain.request(&inputs)).unwrap();
        assert!(body.get("dimensions").is_none(), "{body}");
        assert_eq!(body["model"], "text-embedding-ada-002");

        cfg.request_dimensions = Some(256);
        let sized = HttpEmbedder::from_config(None, &cfg).unwrap();
        let body  = serde_json::to_value(sized.request(&inputs)).unwrap();
        assert_eq!(body["dimensions"], 256);
    }
}
