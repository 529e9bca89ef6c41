//! Classification oracle backed by Google's Gemini `generateContent` REST API.
//!
//! The image is sent inline as a base64 PNG next to the prompt text. The API
//! key travels in the `x-goog-api-key` header so it never shows up in logged URLs.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::oracle::{ClassificationOracle, OracleError, OracleReply, OracleRequest};
use crate::models::WasteSortSettings;
use crate::models::config::PLACEHOLDER_API_KEYS;

/// Why a [`GeminiOracle`] could not be built. The session then runs without an oracle.
#[derive(Error, Debug)]
pub enum OracleInitError {
    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("API key in {0} is empty or a placeholder")]
    PlaceholderApiKey(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct GeminiOracle {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl GeminiOracle {
    /// Build from settings, reading the key from the configured environment variable.
    pub fn from_settings(settings: &WasteSortSettings) -> Result<Self, OracleInitError> {
        let api_key = std::env::var(&settings.api_key_env)
            .map_err(|_| OracleInitError::MissingApiKey(settings.api_key_env.clone()))?;
        Self::new(api_key, settings)
    }

    pub fn new(api_key: String, settings: &WasteSortSettings) -> Result<Self, OracleInitError> {
        let trimmed = api_key.trim();
        if PLACEHOLDER_API_KEYS
            .iter()
            .any(|p| p.eq_ignore_ascii_case(trimmed))
        {
            return Err(OracleInitError::PlaceholderApiKey(settings.api_key_env.clone()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(u64::from(settings.request_timeout)))
            .build()?;

        tracing::info!(
            "Gemini oracle ready: model={}, endpoint={}",
            settings.model,
            settings.endpoint
        );

        Ok(Self {
            client,
            api_key: trimmed.to_string(),
            model: settings.model.clone(),
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            max_output_tokens: settings.max_output_tokens,
            temperature: settings.temperature,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn request_body(&self, request: &OracleRequest) -> Result<serde_json::Value, OracleError> {
        let png = request
            .pixels
            .to_png()
            .map_err(|e| OracleError::Encode(e.to_string()))?;

        Ok(serde_json::json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [
                        {
                            "inline_data": {
                                "mime_type": "image/png",
                                "data": STANDARD.encode(&png)
                            }
                        },
                        {
                            "text": request.prompt
                        }
                    ]
                }
            ],
            "generationConfig": {
                "maxOutputTokens": self.max_output_tokens,
                "temperature": self.temperature
            }
        }))
    }
}

#[async_trait]
impl ClassificationOracle for GeminiOracle {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: OracleRequest) -> Result<OracleReply, OracleError> {
        let body = self.request_body(&request)?;
        let start = Instant::now();

        tracing::debug!(
            "Sending {}x{} image to {}",
            request.pixels.width(),
            request.pixels.height(),
            self.model
        );

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), response.text().await));
        }

        let text = response
            .text()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        tracing::info!(
            "Gemini responded in {}ms ({} bytes)",
            start.elapsed().as_millis(),
            text.len()
        );

        parse_reply(&text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
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

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Reduce a `generateContent` body to text from the first candidate, or the block reasons.
fn parse_reply(body: &str) -> Result<OracleReply, OracleError> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

    let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);
    let first = response.candidates.into_iter().next();
    let finish_reason = first.as_ref().and_then(|c| c.finish_reason.clone());

    let text: String = first
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        tracing::warn!(
            "Gemini returned no text: block_reason={:?}, finish_reason={:?}",
            block_reason,
            finish_reason
        );
        Ok(OracleReply::blocked(block_reason, finish_reason))
    } else {
        Ok(OracleReply {
            text: Some(text),
            block_reason,
            finish_reason,
        })
    }
}

/// Non-2xx reply. A body that cannot be read is kept as detail rather than dropped.
fn status_error<E: std::fmt::Display>(status: u16, body: Result<String, E>) -> OracleError {
    OracleError::Status {
        status,
        body: body.unwrap_or_else(|e| format!("<unreadable body: {}>", e)),
    }
}
