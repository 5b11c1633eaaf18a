// ============================================================
// Layer 5 — Vector Index
// ============================================================
// Exact nearest-neighbour search by inner product.
//
// Every stored vector and every query vector is L2-normalised
// first, so the inner product IS the cosine similarity:
//
//   v_hat = v / (||v|| + 1e-12)
//   score(i) = <chunk_hat_i, query_hat>
//
// All scores are computed at once as one matrix–vector product
// on burn's CPU (NdArray) backend:
//
//   [rows, dim] x [dim, 1] → [rows, 1]
//
// then sorted descending. Equal scores keep slot order so that
// repeated searches return the same sequence.
//
// IndexPack bundles the index with the chunk texts it was built
// from. Slot i of the index is chunk i, always. The pack is
// built in one go and never mutated afterwards.

use std::cmp::Ordering;

use anyhow::Result;
use burn::backend::ndarray::{NdArray, NdArrayDevice};
use burn::tensor::{Tensor, TensorData};

use crate::domain::error::RagError;
use crate::domain::traits::Embedder;

type CpuBackend = NdArray<f32>;

/// Added to the norm so an all-zero vector stays all-zero.
pub const NORM_EPSILON: f64 = 1e-12;

/// Separator placed between retrieved chunks in the context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Scale `v` to unit length in place.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|&x| f64::from(x).powi(2)).sum::<f64>().sqrt() + NORM_EPSILON;
    for x in v.iter_mut() {
        *x = (f64::from(*x) / norm) as f32;
    }
}

/// One search result: index slot and similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub slot:  usize,
    pub score: f32,
}

// ─── FlatIpIndex ──────────────────────────────────────────────────────────────
/// Brute-force inner-product index over a row-major matrix.
#[derive(Debug, Clone, Default)]
pub struct FlatIpIndex {
    dim:  usize,
    rows: usize,
    data: Vec<f32>,
}

impl FlatIpIndex {
    /// Build from already-normalised rows of equal width.
    pub fn from_rows(dim: usize, rows: &[Vec<f32>]) -> Result<Self, RagError> {
        let mut data = Vec::with_capacity(dim * rows.len());
        for row in rows {
            if row.len() != dim {
                return Err(RagError::DimensionMismatch { expected: dim, actual: row.len() });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { dim, rows: rows.len(), data })
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    #[cfg(test)]
    pub fn row(&self, slot: usize) -> Option<&[f32]> {
        (slot < self.rows).then(|| &self.data[slot * self.dim..(slot + 1) * self.dim])
    }

    /// Top-k slots by inner product with `query`, best first.
    /// Returns fewer than `k` hits when the index is smaller.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(RagError::DimensionMismatch { expected: self.dim, actual: query.len() }.into());
        }

        let scores = self.scores(query)?;

        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .enumerate()
            .map(|(slot, score)| SearchHit { slot, score })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.slot.cmp(&b.slot))
        });
        hits.truncate(k);
        Ok(hits)
    }

    fn scores(&self, query: &[f32]) -> Result<Vec<f32>> {
        let device = NdArrayDevice::default();
        let matrix = Tensor::<CpuBackend, 2>::from_data(
            TensorData::new(self.data.clone(), [self.rows, self.dim]),
            &device,
        );
        let query = Tensor::<CpuBackend, 2>::from_data(
            TensorData::new(query.to_vec(), [self.dim, 1]),
            &device,
        );
        matrix
            .matmul(query)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Cannot read similarity scores: {e:?}"))
    }
}

// ─── IndexPack ────────────────────────────────────────────────────────────────
/// A retrieved chunk, borrowed from the pack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievedChunk<'a> {
    pub slot:  usize,
    pub score: f32,
    pub text:  &'a str,
}

/// Search index + the chunk texts + the normalised embeddings,
/// produced by one build and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct IndexPack {
    index:  FlatIpIndex,
    chunks: Vec<String>,
}

impl IndexPack {
    /// A pack with no chunks; every search returns nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Embed, normalise and index `chunks`, keeping their order.
    pub fn build(embedder: &dyn Embedder, chunks: Vec<String>) -> Result<Self> {
        if chunks.is_empty() {
            tracing::info!("No chunks to index; built an empty index");
            return Ok(Self::empty());
        }

        let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let mut vectors = embedder.embed(&refs)?;

        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingCount {
                expected: chunks.len(),
                actual:   vectors.len(),
            }
            .into());
        }

        let dim = vectors[0].len();
        anyhow::ensure!(dim > 0, "embedding provider returned zero-width vectors");

        for v in vectors.iter_mut() {
            l2_normalize(v);
        }
        let index = FlatIpIndex::from_rows(dim, &vectors)?;

        tracing::info!(
            "Indexed {} chunks ({} dims, model {})",
            chunks.len(),
            dim,
            embedder.model_id()
        );
        Ok(Self { index, chunks })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Normalised embedding stored for chunk `slot`.
    #[cfg(test)]
    pub fn embedding(&self, slot: usize) -> Option<&[f32]> {
        self.index.row(slot)
    }

    pub fn dimensions(&self) -> usize {
        self.index.dim()
    }

    /// Top-k chunks for `query`, most similar first.
    pub fn search_hits(
        &self,
        embedder: &dyn Embedder,
        query:    &str,
        k:        usize,
    ) -> Result<Vec<RetrievedChunk<'_>>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut rows = embedder.embed(&[query])?;
        if rows.len() != 1 {
            return Err(RagError::EmbeddingCount { expected: 1, actual: rows.len() }.into());
        }
        let mut q = rows.swap_remove(0);
        l2_normalize(&mut q);

        let hits = self.index.search(&q, k)?;

        // A slot outside the chunk range means "no more matches"
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                self.chunks.get(hit.slot).map(|text| RetrievedChunk {
                    slot:  hit.slot,
                    score: hit.score,
                    text,
                })
            })
            .collect())
    }

    /// Top-k chunk texts joined by a blank line, most similar first.
    pub fn search(&self, embedder: &dyn Embedder, query: &str, k: usize) -> Result<String> {
        let hits = self.search_hits(embedder, query, k)?;
        Ok(hits
            .iter()
            .map(|hit| hit.text)
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR))
    }
}
