// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (indexing a document or answering a question).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - No direct file access (that's Layer 4 and 6)
//   - Only workflow coordination
//
//   pipeline.rs — normalise → chunk → embed → index, and
//                 query → top-k context
//   session.rs  — the active document, the chat history and
//                 the text / voice / speech workflows

/// Stateless build and query orchestration
pub mod pipeline;

/// One user's document, history and engines
pub mod session;
