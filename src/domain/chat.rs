// ============================================================
// Layer 3 — Chat Turn
// ============================================================
// One user question and the assistant's answer. Turns are
// appended in order by the session and only removed when the
// user clears the history. Nothing here is ever written to disk.

use serde::{Deserialize, Serialize};

/// How the question reached the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionSource {
    Text,
    Voice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer:   String,
    pub source:   QuestionSource,
}

impl ChatTurn {
    pub fn new(
        question: impl Into<String>,
        answer:   impl Into<String>,
        source:   QuestionSource,
    ) -> Self {
        Self {
            question: question.into(),
            answer:   answer.into(),
            source,
        }
    }
}
