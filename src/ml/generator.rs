// ============================================================
// Layer 5 — Answer Generators
// ============================================================
// Three implementations of the AnswerGenerator trait:
//
//   ChatCompletionGenerator — OpenAI-compatible /chat/completions.
//     The instruction goes in the system role, context + question
//     in the user role; the reply needs no post-processing.
//
//   TextCompletionGenerator — /completions with one flat prompt:
//
//       <s>[SYSTEM]
//       {instruction}
//       </s>
//       [CONTEXT]
//       {context}
//
//       [USER]
//       {question}
//
//       [ASSISTANT]
//
//     Some servers echo the prompt, some don't, so the answer is
//     recovered with `extract_answer`.
//
//   ExtractiveGenerator — offline. Picks the context sentence
//     that shares the most (length-weighted, whole-word) question
//     terms and cites its page. No model, no network.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::data::chunker::split_pages;
use crate::domain::document::PAGE_MARKER;
use crate::domain::traits::{AnswerGenerator, GenerationRequest};
use crate::ml::http::{build_client, check_status, endpoint};
use crate::ml::vector_index::CONTEXT_SEPARATOR;

/// Returned whenever the context does not support an answer.
pub const FALLBACK_ANSWER: &str = "I don't know based on the provided material.";

pub const SYSTEM_PROMPT: &str = "You are a concise, helpful assistant. Only use the provided \
document context to answer. If the answer is not clearly contained in the context, reply: \
'I don't know based on the provided material.' Cite page numbers if present in the snippets \
(e.g., [Page X]).";

/// Where the model's turn begins in the flat prompt.
pub const ASSISTANT_MARKER: &str = "[ASSISTANT]";

/// First `max_chars` characters of `context`. Cuts on a char
/// boundary, not on a chunk boundary.
pub fn truncate_context(context: &str, max_chars: usize) -> &str {
    match context.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &context[..byte_idx],
        None => context,
    }
}

/// Flat prompt for completion-style models.
pub fn build_prompt(system: &str, question: &str, context: &str) -> String {
    format!(
        "<s>[SYSTEM]\n{system}\n</s>\n[CONTEXT]\n{context}\n\n[USER]\n{question}\n\n{ASSISTANT_MARKER}"
    )
}

/// Recover the answer from raw completion output.
///
/// - marker present  → text after its LAST occurrence
/// - prompt echoed   → text after the prompt
/// - otherwise       → the whole output
///
/// All three are trimmed.
pub fn extract_answer(generated: &str, prompt: &str) -> String {
    if let Some((_, answer)) = generated.rsplit_once(ASSISTANT_MARKER) {
        return answer.trim().to_string();
    }
    generated
        .strip_prefix(prompt)
        .unwrap_or(generated)
        .trim()
        .to_string()
}

// ─── ChatCompletionGenerator ──────────────────────────────────────────────────
pub struct ChatCompletionGenerator {
    client:   Client,
    endpoint: String,
    model:    String,
}

impl ChatCompletionGenerator {
    pub fn new(
        api_key:  Option<String>,
        base_url: String,
        model:    String,
        timeout:  Duration,
    ) -> Result<Self> {
        let client = build_client(api_key.as_deref(), timeout, "chat completions")?;
        Ok(Self {
            client,
            endpoint: endpoint(&base_url, "chat/completions"),
            model,
        })
    }
}

impl AnswerGenerator for ChatCompletionGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let user = format!("Context:\n{}\n\nQuestion: {}", request.context, request.question);
        let body = ChatRequest {
            model:       &self.model,
            temperature: request.temperature,
            max_tokens:  request.max_new_tokens,
            messages: vec![
                ChatMessage { role: "system", content: request.system },
                ChatMessage { role: "user",   content: &user },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .context("failed to call chat completions")?;
        let parsed: ChatResponse = check_status(resp, "chat completions")?
            .json()
            .context("failed to parse chat completions response")?;

        let answer = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(answer.trim().to_string())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model:       &'a str,
    temperature: f32,
    max_tokens:  usize,
    messages:    Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role:    &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

// ─── TextCompletionGenerator ──────────────────────────────────────────────────
pub struct TextCompletionGenerator {
    client:   Client,
    endpoint: String,
    model:    String,
}

impl TextCompletionGenerator {
    pub fn new(
        api_key:  Option<String>,
        base_url: String,
        model:    String,
        timeout:  Duration,
    ) -> Result<Self> {
        let client = build_client(api_key.as_deref(), timeout, "text completions")?;
        Ok(Self {
            client,
            endpoint: endpoint(&base_url, "completions"),
            model,
        })
    }
}

impl AnswerGenerator for TextCompletionGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let prompt = build_prompt(request.system, request.question, request.context);
        let body = CompletionRequest {
            model:       &self.model,
            prompt:      &prompt,
            max_tokens:  request.max_new_tokens,
            temperature: request.temperature,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .context("failed to call text completions")?;
        let parsed: CompletionResponse = check_status(resp, "text completions")?
            .json()
            .context("failed to parse text completions response")?;

        let generated = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .unwrap_or_default();
        Ok(extract_answer(&generated, &prompt))
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model:       &'a str,
    prompt:      &'a str,
    max_tokens:  usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

// ─── ExtractiveGenerator ──────────────────────────────────────────────────────
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "what", "when", "where", "which", "who",
    "whom", "why", "how", "does", "did", "will", "this", "that", "these", "those", "have",
    "has", "had", "from", "with", "about", "into", "there", "their", "they", "can", "could",
    "would", "should", "you", "your", "its", "not", "any", "all", "tell", "according",
    "document", "pdf",
];

/// Offline answerer: best-matching sentence from the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveGenerator;

/// A candidate sentence and the page it came from, if known.
struct Sentence<'a> {
    text: &'a str,
    page: Option<&'a str>,
}

impl ExtractiveGenerator {
    pub fn new() -> Self {
        Self
    }

    fn sentences<'a>(context: &'a str) -> Vec<Sentence<'a>> {
        let mut out = Vec::new();
        for chunk in context.split(CONTEXT_SEPARATOR) {
            for segment in split_pages(chunk) {
                let (page, body) = match PAGE_MARKER.captures(segment) {
                    Some(caps) if caps.get(0).is_some_and(|m| m.start() == 0) => {
                        let marker = caps.get(0).map_or(0, |m| m.end());
                        (caps.get(1).map(|m| m.as_str()), &segment[marker..])
                    }
                    _ => (None, segment),
                };
                out.extend(
                    split_sentences(body)
                        .into_iter()
                        .map(|text| Sentence { text, page }),
                );
            }
        }
        out
    }
}

impl AnswerGenerator for ExtractiveGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let terms = key_terms(request.question);
        if terms.is_empty() {
            return Ok(FALLBACK_ANSWER.to_string());
        }

        let mut best: Option<(usize, Sentence<'_>)> = None;
        for sentence in Self::sentences(request.context) {
            let lower = sentence.text.to_lowercase();
            // Longer, more specific terms outweigh short generic ones
            let score: usize = terms
                .iter()
                .filter(|t| contains_word(&lower, t))
                .map(|t| t.chars().count())
                .sum();
            if score > 0 && best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, sentence));
            }
        }

        Ok(match best {
            Some((score, sentence)) => {
                tracing::debug!("Extractive answer scored {}", score);
                match sentence.page {
                    Some(page) => format!("{} [Page {}]", sentence.text, page),
                    None       => sentence.text.to_string(),
                }
            }
            None => FALLBACK_ANSWER.to_string(),
        })
    }
}

/// Lowercased question words, minus punctuation, stop words and
/// very short words. Short numbers ("Term 2") are kept.
fn key_terms(question: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    question
        .split_whitespace()
        .map(|w| {
            w.to_lowercase()
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_string()
        })
        .filter(|w| {
            !w.is_empty()
                && !STOP_WORDS.contains(&w.as_str())
                && (w.chars().count() > 2 || w.chars().all(|c| c.is_ascii_digit()))
        })
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Split after `.`, `!` or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out   = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_break = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_break {
                let end = i + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                start = end;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// Whole-word match: "how" must not match inside "showcase".
fn contains_word(text: &str, word: &str) -> bool {
    let tb = text.as_bytes();
    let wb = word.as_bytes();
    let wl = wb.len();
    if wl == 0 || wl > tb.len() {
        return false;
    }
    for i in 0..=(tb.len() - wl) {
        if &tb[i..i + wl] == wb {
            let before_ok = i == 0 || !tb[i - 1].is_ascii_alphanumeric();
            let after_ok  = i + wl == tb.len() || !tb[i + wl].is_ascii_alphanumeric();
            if before_ok && after_ok {
                return true;
            }
        }
    }
    false
}
