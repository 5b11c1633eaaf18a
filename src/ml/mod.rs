// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// Everything that turns text into numbers or numbers into
// answers lives here. Burn is only imported by the vector index;
// no other layer touches tensors.
//
// What's in this layer:
//
//   http.rs         — Shared blocking client + status handling
//                     for OpenAI-compatible model servers
//
//   embedder.rs     — Embedding providers
//                     • HashingEmbedder: offline, tokenizers-based
//                       signed feature hashing
//                     • HttpEmbedder: /embeddings with retries
//
//   vector_index.rs — L2 normalisation, flat inner-product search
//                     on the NdArray backend, and the IndexPack
//                     that ties chunks to index slots
//
//   generator.rs    — Answer generators (chat, text completion,
//                     offline extractive) and prompt helpers
//
//   transcriber.rs  — Speech-to-text over /audio/transcriptions
//
//   synthesizer.rs  — Text-to-speech via an espeak-style program

/// HTTP client construction shared by the remote engines
pub mod http;

/// Text → vector providers
pub mod embedder;

/// Normalised vectors, top-k search, IndexPack
pub mod vector_index;

/// Grounded answer generation
pub mod generator;

/// Voice question transcription
pub mod transcriber;

/// Spoken answers
pub mod synthesizer;
