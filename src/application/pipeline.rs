// ============================================================
// Layer 2 — Retrieval Pipeline
// ============================================================
// Build and query orchestration, with no state of its own
// beyond configuration:
//
//   index_document:
//     Step 1: Normalise the raw page-marked text   (Layer 4)
//     Step 2: Reject a document with no text       (Layer 3)
//     Step 3: Chunk into page-respecting windows   (Layer 4)
//     Step 4: Embed + normalise + index            (Layer 5)
//
//   retrieve:
//     embed the query, top-k search, join the chunk texts

use anyhow::Result;

use crate::data::{chunker::Chunker, preprocessor::TextNormalizer};
use crate::domain::error::RagError;
use crate::domain::traits::Embedder;
use crate::infra::config::RagConfig;
use crate::ml::vector_index::IndexPack;

#[derive(Debug, Clone)]
pub struct RetrievalPipeline {
    normalizer: TextNormalizer,
    chunker:    Chunker,
    top_k:      usize,
}

impl RetrievalPipeline {
    pub fn new(chunker: Chunker, top_k: usize) -> Result<Self, RagError> {
        if top_k == 0 {
            return Err(RagError::InvalidConfig("top_k must be at least 1".into()));
        }
        Ok(Self { normalizer: TextNormalizer::new(), chunker, top_k })
    }

    pub fn from_config(cfg: &RagConfig) -> Result<Self, RagError> {
        let c = &cfg.chunking;
        Self::new(Chunker::new(c.chunk_size, c.overlap, c.respect_pages)?, cfg.retrieval.top_k)
    }

    /// Turn raw document text into a searchable IndexPack.
    ///
    /// # Errors
    /// `RagError::EmptyDocument` when nothing is left after
    /// normalisation; provider errors from the embedder.
    pub fn index_document(&self, embedder: &dyn Embedder, raw_text: &str) -> Result<IndexPack> {
        // ── Step 1: Normalise ─────────────────────────────────────────────────
        let text = self.normalizer.normalize(raw_text);

        // ── Step 2: Reject empty ──────────────────────────────────────────────
        if text.is_empty() {
            return Err(RagError::EmptyDocument.into());
        }

        // ── Step 3: Chunk ─────────────────────────────────────────────────────
        let chunks = self.chunker.chunk(&text);
        tracing::debug!(
            "Chunked {} chars into {} chunks (size {}, overlap {}, per page: {})",
            text.len(),
            chunks.len(),
            self.chunker.chunk_size(),
            self.chunker.overlap(),
            self.chunker.respects_pages()
        );

        // ── Step 4: Embed + index ─────────────────────────────────────────────
        IndexPack::build(embedder, chunks)
    }

    /// Context for `query`: the top-k chunks, best first, joined
    /// by a blank line. Empty when the pack is empty.
    pub fn retrieve(&self, embedder: &dyn Embedder, pack: &IndexPack, query: &str) -> Result<String> {
        pack.search(embedder, query, self.top_k)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::embedder::HashingEmbedder;

    fn pipeline(size: usize, overlap: usize, top_k: usize) -> RetrievalPipeline {
        RetrievalPipeline::new(Chunker::new(size, overlap, true).unwrap(), top_k).unwrap()
    }

    #[test]
    fn test_blank_document_is_rejected() {
        let embedder = HashingEmbedder::new(64).unwrap();
        for raw in ["", "   \n\n\n   "] {
            let err = pipeline(5, 1, 3).index_document(&embedder, raw).unwrap_err();
            assert_eq!(err.downcast_ref::<RagError>(), Some(&RagError::EmptyDocument));
        }
    }

    #[test]
    fn test_two_page_document_windows() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let pack = pipeline(5, 1, 3)
            .index_document(&embedder, "[Page 1]\nThe cat sat on the mat. [Page 2]\nDogs bark loudly.")
            .unwrap();
        assert_eq!(
            pack.chunks(),
            &["[Page 1] The cat sat", "sat on the mat.", "[Page 2] Dogs bark loudly."]
        );
    }

    #[test]
    fn test_retrieve_finds_relevant_page() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let p        = pipeline(8, 2, 1);
        let pack     = p
            .index_document(
                &embedder,
                "[Page 1]\nQuarterly revenue grew twelve percent.\n\n[Page 2]\nThe parking policy changed in March.",
            )
            .unwrap();
        let context = p.retrieve(&embedder, &pack, "parking policy").unwrap();
        assert!(context.starts_with("[Page 2]"), "{context}");
    }

    #[test]
    fn test_retrieve_on_empty_pack() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let context  = pipeline(5, 1, 3).retrieve(&embedder, &IndexPack::empty(), "q").unwrap();
        assert_eq!(context, "");
    }

    #[test]
    fn test_invalid_settings_fail_fast() {
        let mut cfg = RagConfig::default();
        cfg.chunking.overlap = cfg.chunking.chunk_size;
        assert!(RetrievalPipeline::from_config(&cfg).is_err());

        let mut cfg = RagConfig::default();
        cfg.retrieval.top_k = 0;
        assert!(RetrievalPipeline::from_config(&cfg).is_err());
    }
}
