// ============================================================
// Layer 2 — Session
// ============================================================
// One user's working state: the injected engines, the currently
// loaded document with its IndexPack, and the chat history.
//
//   load_document  → index a new upload, then swap it in
//   ask            → retrieve → truncate → generate → record turn
//   ask_voice      → transcribe → ask (silence asks nothing)
//   speak          → synthesize an answer into the audio store
//
// The active document sits behind RwLock<Option<Arc<..>>>:
// a query clones the Arc and runs against that snapshot, an
// upload builds the new pack first and only then swaps the
// pointer. A failed upload leaves the previous document active.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::{Context, Result};

use crate::application::pipeline::RetrievalPipeline;
use crate::domain::chat::{ChatTurn, QuestionSource};
use crate::domain::document::{Document, DocumentMetadata};
use crate::domain::error::RagError;
use crate::domain::traits::GenerationRequest;
use crate::infra::audio_store::AudioStore;
use crate::infra::config::RagConfig;
use crate::infra::services::Services;
use crate::ml::generator::{truncate_context, FALLBACK_ANSWER, SYSTEM_PROMPT};
use crate::ml::vector_index::IndexPack;

/// The document questions are currently answered from.
#[derive(Debug)]
pub struct LoadedDocument {
    pub source:   String,
    pub metadata: Option<DocumentMetadata>,
    pub pages:    usize,
    pub pack:     Arc<IndexPack>,
}

/// What `load_document` reports back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSummary {
    pub source:   String,
    pub pages:    usize,
    pub chunks:   usize,
    pub metadata: Option<DocumentMetadata>,
}

/// A produced answer and the context it was grounded on.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text:    String,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceOutcome {
    /// The clip transcribed to nothing; no question was asked
    NoSpeech,
    Answered { transcript: String, answer: Answer },
}

pub struct Session {
    config:   RagConfig,
    services: Services,
    pipeline: RetrievalPipeline,
    document: RwLock<Option<Arc<LoadedDocument>>>,
    history:  Mutex<Vec<ChatTurn>>,
    audio:    AudioStore,
}

impl Session {
    /// Validate the configuration and create an empty session.
    pub fn new(config: RagConfig, services: Services) -> Result<Self> {
        config.validate()?;
        let pipeline = RetrievalPipeline::from_config(&config)?;
        let audio    = AudioStore::new(&config.speech.output_dir, config.speech.max_files);
        Ok(Self {
            config,
            services,
            pipeline,
            document: RwLock::new(None),
            history:  Mutex::new(Vec::new()),
            audio,
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Index `doc` and make it the active document.
    ///
    /// # Errors
    /// `RagError::EmptyDocument` if the document has no text; the
    /// previously loaded document stays active in that case.
    pub fn load_document(&self, doc: Document) -> Result<IndexSummary> {
        let embedder = self.services.embedder.get()?;
        let pack = self
            .pipeline
            .index_document(embedder.as_ref(), &doc.text)
            .with_context(|| format!("Cannot index '{}'", doc.source))?;

        let pages = doc
            .metadata
            .as_ref()
            .map_or_else(|| doc.page_count(), |m| m.page_count);

        let loaded = Arc::new(LoadedDocument {
            source:   doc.source,
            metadata: doc.metadata,
            pages,
            pack:     Arc::new(pack),
        });

        let summary = IndexSummary {
            source:   loaded.source.clone(),
            pages:    loaded.pages,
            chunks:   loaded.pack.len(),
            metadata: loaded.metadata.clone(),
        };

        *self.document.write().unwrap_or_else(PoisonError::into_inner) = Some(loaded);
        tracing::info!(
            "'{}' ready for questions ({} pages, {} chunks)",
            summary.source,
            summary.pages,
            summary.chunks
        );
        Ok(summary)
    }

    /// Snapshot of the active document, if any.
    pub fn document(&self) -> Option<Arc<LoadedDocument>> {
        self.document
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Answer a typed question from the active document.
    pub fn ask(&self, question: &str) -> Result<Answer> {
        self.answer(question, QuestionSource::Text)
    }

    /// Transcribe a recorded question and answer it. A clip that
    /// transcribes to nothing asks nothing and records no turn.
    pub fn ask_voice(&self, audio: &[u8]) -> Result<VoiceOutcome> {
        let transcriber = self.services.transcriber.get()?;
        let transcript  = transcriber
            .transcribe(audio)
            .context("Transcription failed")?;
        let transcript = transcript.trim();

        if transcript.is_empty() {
            tracing::warn!("Transcription produced no text");
            return Ok(VoiceOutcome::NoSpeech);
        }

        tracing::info!("Voice question: {}", transcript);
        let answer = self.answer(transcript, QuestionSource::Voice)?;
        Ok(VoiceOutcome::Answered { transcript: transcript.to_string(), answer })
    }

    fn answer(&self, question: &str, source: QuestionSource) -> Result<Answer> {
        let document = self.document().ok_or(RagError::NoDocument)?;
        let question = question.trim();

        let embedder = self.services.embedder.get()?;
        let context  = self
            .pipeline
            .retrieve(embedder.as_ref(), &document.pack, question)?;
        let context  = truncate_context(&context, self.config.retrieval.max_context_chars);

        let generator = self.services.generator.get()?;
        let request   = GenerationRequest {
            system:         SYSTEM_PROMPT,
            question,
            context,
            max_new_tokens: self.config.generation.max_new_tokens,
            temperature:    self.config.generation.temperature,
        };
        let text = generator.generate(&request).context("Answer generation failed")?;
        let text = match text.trim() {
            "" => FALLBACK_ANSWER.to_string(),
            t  => t.to_string(),
        };

        tracing::info!("Answered from {} chars of context", context.chars().count());
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ChatTurn::new(question, text.clone(), source));

        Ok(Answer { text, context: context.to_string() })
    }

    /// Speak `text` into a new file in the audio store. Failures
    /// are logged and reported as `None`; the answer itself is
    /// never lost because of them.
    pub fn speak(&self, text: &str) -> Option<PathBuf> {
        if !self.config.speech.enabled {
            return None;
        }
        let result = self.services.synthesizer.get().and_then(|synth| {
            let out = self.audio.allocate()?;
            if let Err(e) = synth.synthesize(text, &out) {
                self.audio.discard(&out);
                return Err(e);
            }
            self.audio.commit(&out)?;
            Ok(out)
        });
        match result {
            Ok(path) => {
                tracing::info!("Spoken answer written to '{}'", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Text-to-speech failed: {:#}", e);
                None
            }
        }
    }

    /// All turns so far, oldest first.
    pub fn history(&self) -> Vec<ChatTurn> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_history(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::debug!("Chat history cleared");
    }
}
