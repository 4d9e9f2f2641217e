//! Tag generation through the Gemini `generateContent` REST endpoint.
//!
//! Each call uploads the media bytes inline (base64) together with the
//! configured prompt and reads the first candidate's text back as a
//! comma-separated tag list. The API key travels in the `x-goog-api-key`
//! header and is fetched from the [`CredentialProvider`] per request.

use super::{CredentialProvider, TagError, TagGenerator, TagRecord, mime_type, parse_tags};
use crate::config::{ConfigError, TaggingConfig};
use base64::{Engine as _, engine::general_purpose};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub struct GeminiTagger<C> {
    client: Client,
    credentials: C,
    settings: TaggingConfig,
}

impl<C: CredentialProvider> GeminiTagger<C> {
    pub fn new(settings: TaggingConfig, credentials: C) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            credentials,
            settings,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        )
    }
}

impl<C: CredentialProvider> TagGenerator for GeminiTagger<C> {
    fn probe(&self) -> Result<(), ConfigError> {
        self.credentials.api_key().map(|_| ())
    }

    fn generate(&self, path: &Path) -> Result<TagRecord, TagError> {
        let key = self
            .credentials
            .api_key()
            .map_err(|e| TagError::Terminal(e.to_string()))?;
        let bytes = std::fs::read(path)?;
        let body = request_body(
            &self.settings.prompt,
            self.settings.temperature,
            mime_type(path),
            &bytes,
        );

        debug!(file = %path.display(), bytes = bytes.len(), "requesting tags");
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(classify_status(status, &detail));
        }

        let reply: GenerateResponse = response
            .json()
            .map_err(|e| TagError::Terminal(format!("Malformed response: {}", e)))?;
        let text = reply
            .text()
            .ok_or_else(|| TagError::Terminal("Response contained no text".into()))?;
        Ok(parse_tags(&text))
    }
}

fn request_body(prompt: &str, temperature: f32, mime: &str, media: &[u8]) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "parts": [
                { "text": prompt },
                {
                    "inline_data": {
                        "mime_type": mime,
                        "data": general_purpose::STANDARD.encode(media),
                    }
                }
            ]
        }],
        "generationConfig": { "temperature": temperature }
    })
}

/// Rate limiting, request timeouts and server-side failures are worth retrying.
fn classify_status(status: StatusCode, detail: &str) -> TagError {
    let message = format!("HTTP {}: {}", status.as_u16(), detail.trim());
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        TagError::Transient(message)
    } else {
        TagError::Terminal(message)
    }
}

fn classify_transport(err: reqwest::Error) -> TagError {
    if err.is_builder() {
        TagError::Terminal(err.to_string())
    } else {
        TagError::Transient(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }
}
