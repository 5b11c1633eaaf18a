// ============================================================
// Layer 6 — Service Registry
// ============================================================
// The embedding model, answer generator, transcriber and speech
// synthesizer are each created once and reused for the life of
// the process. Instead of globals they live in a `Services`
// value owned by the session, so tests can hand in fakes.
//
// LazyService<T>:
//   fast path  — OnceLock read, no locking once initialised
//   slow path  — Mutex held while the initialiser runs, re-checked
//                after acquiring it, so at most one initialiser
//                ever runs even when many threads race
// A failed initialisation leaves the cell empty; the next call
// retries.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use anyhow::Result;

use crate::domain::error::RagError;
use crate::domain::traits::{AnswerGenerator, Embedder, SpeechSynthesizer, Transcriber};
use crate::infra::config::{EmbedderKind, GeneratorKind, RagConfig};
use crate::ml::embedder::{HashingEmbedder, HttpEmbedder};
use crate::ml::generator::{ChatCompletionGenerator, ExtractiveGenerator, TextCompletionGenerator};
use crate::ml::synthesizer::CommandSynthesizer;
use crate::ml::transcriber::HttpTranscriber;

type Init<T> = Box<dyn Fn() -> Result<Arc<T>> + Send + Sync>;

pub struct LazyService<T: ?Sized> {
    name:      &'static str,
    ready:     OnceLock<Arc<T>>,
    init_lock: Mutex<()>,
    init:      Init<T>,
}

impl<T: ?Sized> LazyService<T> {
    pub fn new<F>(name: &'static str, init: F) -> Self
    where
        F: Fn() -> Result<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            name,
            ready:     OnceLock::new(),
            init_lock: Mutex::new(()),
            init:      Box::new(init),
        }
    }

    /// Already initialised with `instance`.
    pub fn ready(name: &'static str, instance: Arc<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        let svc = Self::new(name, || Err(anyhow::anyhow!("service already initialised")));
        let _ = svc.ready.set(instance);
        svc
    }

    /// A service that fails every time it is requested.
    pub fn unavailable(name: &'static str) -> Self
    where
        T: 'static,
    {
        Self::new(name, move || Err(RagError::NotConfigured(name).into()))
    }

    pub fn get(&self) -> Result<Arc<T>> {
        if let Some(svc) = self.ready.get() {
            return Ok(Arc::clone(svc));
        }

        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(svc) = self.ready.get() {
            return Ok(Arc::clone(svc));
        }

        tracing::info!("Initialising {}", self.name);
        let svc = (self.init)()?;
        let _ = self.ready.set(Arc::clone(&svc));
        Ok(svc)
    }

    #[cfg(test)]
    pub fn is_initialised(&self) -> bool {
        self.ready.get().is_some()
    }
}

/// The external engines one session talks to.
pub struct Services {
    pub embedder:    LazyService<dyn Embedder>,
    pub generator:   LazyService<dyn AnswerGenerator>,
    pub transcriber: LazyService<dyn Transcriber>,
    pub synthesizer: LazyService<dyn SpeechSynthesizer>,
}

impl Services {
    /// Wire every service from configuration. Nothing is
    /// constructed until first use.
    pub fn from_config(cfg: &RagConfig) -> Self {
        let embedding = cfg.embedding.clone();
        let api_key   = cfg.api_key.clone();
        let embedder = LazyService::<dyn Embedder>::new("embedding model", move || {
            let svc: Arc<dyn Embedder> = match embedding.provider {
                EmbedderKind::Hashing => Arc::new(HashingEmbedder::from_config(&embedding)?),
                EmbedderKind::Http    => Arc::new(HttpEmbedder::from_config(api_key.clone(), &embedding)?),
            };
            Ok(svc)
        });

        let generation = cfg.generation.clone();
        let api_key    = cfg.api_key.clone();
        let generator = LazyService::<dyn AnswerGenerator>::new("answer generator", move || {
            let base_url = || {
                generation
                    .base_url
                    .clone()
                    .ok_or(RagError::NotConfigured("generation.base_url"))
            };
            let timeout = Duration::from_secs(generation.timeout_secs);
            let svc: Arc<dyn AnswerGenerator> = match generation.provider {
                GeneratorKind::Extractive => Arc::new(ExtractiveGenerator::new()),
                GeneratorKind::Chat => Arc::new(ChatCompletionGenerator::new(
                    api_key.clone(),
                    base_url()?,
                    generation.model.clone(),
                    timeout,
                )?),
                GeneratorKind::Completion => Arc::new(TextCompletionGenerator::new(
                    api_key.clone(),
                    base_url()?,
                    generation.model.clone(),
                    timeout,
                )?),
            };
            Ok(svc)
        });

        let transcriber = match cfg.transcription.base_url.clone() {
            Some(base_url) => {
                let t       = cfg.transcription.clone();
                let api_key = cfg.api_key.clone();
                LazyService::<dyn Transcriber>::new("speech-to-text model", move || {
                    let svc: Arc<dyn Transcriber> = Arc::new(HttpTranscriber::new(
                        api_key.clone(),
                        base_url.clone(),
                        t.model.clone(),
                        t.language.clone(),
                        Duration::from_secs(t.timeout_secs),
                    )?);
                    Ok(svc)
                })
            }
            None => LazyService::unavailable("transcription.base_url"),
        };

        let speech = cfg.speech.clone();
        let synthesizer = LazyService::<dyn SpeechSynthesizer>::new("speech synthesizer", move || {
            let svc: Arc<dyn SpeechSynthesizer> = Arc::new(CommandSynthesizer::from_config(&speech));
            Ok(svc)
        });

        Self { embedder, generator, transcriber, synthesizer }
    }

    /// Use ready-made instances (tests, embedding in other programs).
    pub fn with_instances(
        embedder:    Arc<dyn Embedder>,
        generator:   Arc<dyn AnswerGenerator>,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            embedder:    LazyService::ready("embedding model", embedder),
            generator:   LazyService::ready("answer generator", generator),
            transcriber: LazyService::ready("speech-to-text model", transcriber),
            synthesizer: LazyService::ready("speech synthesizer", synthesizer),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_initialiser_runs_once_under_contention() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let svc: Arc<LazyService<String>> = Arc::new(LazyService::new("test", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Ok(Arc::new("model".to_string()))
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = Arc::clone(&svc);
                thread::spawn(move || svc.get().unwrap())
            })
            .collect();
        let results: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Every caller shares the same instance
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_init_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let svc: LazyService<u32> = LazyService::new("flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("first attempt fails");
            }
            Ok(Arc::new(7))
        });
        assert!(svc.get().is_err());
        assert!(!svc.is_initialised());
        assert_eq!(*svc.get().unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unavailable_reports_not_configured() {
        let svc: LazyService<dyn Transcriber> = LazyService::unavailable("transcription.base_url");
        let err = svc.get().err().unwrap();
        assert_eq!(
            err.downcast_ref::<RagError>(),
            Some(&RagError::NotConfigured("transcription.base_url"))
        );
    }

    #[test]
    fn test_default_config_builds_offline_services() {
        let services = Services::from_config(&RagConfig::default());
        assert!(!services.embedder.is_initialised());
        assert!(services.embedder.get().is_ok());
        assert!(services.generator.get().is_ok());
        assert!(services.transcriber.get().is_err());
    }
}
