// ============================================================
// Layer 5 — Speech-to-Text
// ============================================================
// Sends a recorded clip to an OpenAI-compatible
// /audio/transcriptions endpoint (faster-whisper-server,
// whisper.cpp server, ...) as a multipart upload and returns the
// transcript. An empty transcript is passed through as "" so the
// session can tell silence apart from a failure.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::traits::Transcriber;
use crate::ml::http::{build_client, check_status, endpoint};

pub struct HttpTranscriber {
    client:   Client,
    endpoint: String,
    model:    String,
    language: Option<String>,
}

impl HttpTranscriber {
    pub fn new(
        api_key:  Option<String>,
        base_url: String,
        model:    String,
        language: Option<String>,
        timeout:  Duration,
    ) -> Result<Self> {
        let client = build_client(api_key.as_deref(), timeout, "transcription")?;
        Ok(Self {
            client,
            endpoint: endpoint(&base_url, "audio/transcriptions"),
            model,
            language,
        })
    }
}

impl Transcriber for HttpTranscriber {
    fn transcribe(&self, audio: &[u8]) -> Result<String> {
        anyhow::ensure!(!audio.is_empty(), "audio clip is empty");

        let file = Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .context("invalid audio mime type")?;

        let mut form = Form::new()
            .text("model", self.model.clone())
            .part("file", file);
        if let Some(lang) = &self.language {
            form = form.text("language", lang.clone());
        }

        tracing::debug!("Transcribing {} bytes of audio", audio.len());
        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .context("failed to call transcription server")?;
        let parsed: TranscriptionResponse = check_status(resp, "transcription server")?
            .json()
            .context("failed to parse transcription response")?;

        Ok(parsed.text.trim().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_clip_is_rejected_before_any_request() {
        // Nothing listens on port 9; the guard fires first
        let t = HttpTranscriber::new(
            None,
            "http://127.0.0.1:9/v1".into(),
            "small".into(),
            None,
            Duration::from_millis(100),
        )
        .unwrap();
        let err = t.transcribe(&[]).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn response_without_text_reads_as_silence() {
        let parsed: TranscriptionResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.text, "");
    }
}
