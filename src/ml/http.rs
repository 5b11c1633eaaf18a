// ============================================================
// Layer 5 — HTTP plumbing for model servers
// ============================================================
// Every remote engine here speaks the OpenAI-compatible REST
// dialect (llama.cpp server, vLLM, Ollama, text-embeddings-
// inference, faster-whisper-server, ...). They share one way of
// building a blocking client and one way of turning a non-2xx
// response into an error that carries the body.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

/// Blocking client with an optional bearer token.
pub fn build_client(api_key: Option<&str>, timeout: Duration, what: &str) -> Result<Client> {
    let mut headers = HeaderMap::new();
    if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
        let auth = format!("Bearer {key}");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).with_context(|| format!("invalid API key for {what}"))?,
        );
    }
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .with_context(|| format!("failed to build {what} HTTP client"))
}

/// `{base_url}/{path}` without doubled slashes.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Pass successful responses through, turn the rest into errors.
pub fn check_status(resp: Response, what: &str) -> Result<Response> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(status_error(resp, what))
    }
}

/// Error for a non-2xx response, carrying its body.
pub fn status_error(resp: Response, what: &str) -> anyhow::Error {
    let status = resp.status();
    let body = resp
        .text()
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    anyhow::anyhow!("{what} returned {status}: {body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_cleanly() {
        assert_eq!(endpoint("http://h:8080/v1/", "/embeddings"), "http://h:8080/v1/embeddings");
        assert_eq!(endpoint("http://h/v1", "chat/completions"), "http://h/v1/chat/completions");
    }

    #[test]
    fn client_builds_without_key() {
        assert!(build_client(None, Duration::from_secs(1), "test").is_ok());
        assert!(build_client(Some("  "), Duration::from_secs(1), "test").is_ok());
    }
}
