// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong to any one business
// layer:
//
//   config.rs      — RagConfig: every tunable, JSON-loadable,
//                    validated before any work starts
//
//   services.rs    — Services / LazyService: the four external
//                    engines, each created at most once and
//                    shared for the life of the process
//
//   audio_store.rs — Output directory for spoken answers with
//                    bounded retention

/// Run configuration and validation
pub mod config;

/// Lazily initialised, injectable engines
pub mod services;

/// Synthesized audio file allocation and eviction
pub mod audio_store;
