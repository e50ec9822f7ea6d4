//! Model server access.
//!
//! The pipeline only sees two capabilities, `EmbeddingProvider` and
//! `CompletionProvider`. `OllamaClient` implements both against the
//! Ollama HTTP API with blocking reqwest calls; tests swap in fakes.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::retry::Retryable;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_)
            | ProviderError::Unreachable(_)
            | ProviderError::Request(_) => true,
            ProviderError::Status { status, .. } => *status >= 500 || *status == 429,
            ProviderError::InvalidResponse(_) => true,
        }
    }
}

impl ProviderError {
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(timeout)
        } else if err.is_connect() {
            ProviderError::Unreachable(err.to_string())
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Request(err.to_string())
        }
    }
}

/// Turns text into a vector.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Model name, for logs and the run summary
    fn model(&self) -> &str;
}

/// Free-form text generation.
pub trait CompletionProvider: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    fn model(&self) -> &str;
}

#[derive(Serialize, Debug)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[derive(Serialize, Debug)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    response: Option<String>,
}

/// Blocking client for an Ollama-compatible server.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    json_mode: bool,
}

impl OllamaClient {
    fn build(base_url: &str, model: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
            json_mode: false,
        })
    }

    /// Client for `/api/embeddings` with the configured embedding model.
    pub fn for_embeddings(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::build(
            &config.base_url,
            &config.embedding_model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Client for `/api/generate` with the configured rating model.
    pub fn for_rating(config: &ProviderConfig, json_mode: bool) -> Result<Self, ProviderError> {
        let mut client = Self::build(
            &config.base_url,
            &config.rating_model,
            Duration::from_secs(config.rating_timeout_secs),
        )?;
        client.json_mode = json_mode;
        Ok(client)
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        log::trace!("POST {url}");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

/// Pull the vector out of an `/api/embeddings` response body.
fn parse_embedding_response(text: &str) -> Result<Vec<f32>, ProviderError> {
    let parsed: EmbeddingResponse = serde_json::from_str(text).map_err(|err| {
        log::error!("{err}. tried to parse: {text:?}");
        ProviderError::InvalidResponse(err.to_string())
    })?;

    if parsed.embedding.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "response contains no embedding".to_string(),
        ));
    }

    Ok(parsed.embedding)
}

/// Pull the generated text out of an `/api/generate` response body.
fn parse_generate_response(text: &str) -> Result<String, ProviderError> {
    let parsed: GenerateResponse = serde_json::from_str(text).map_err(|err| {
        log::error!("{err}. tried to parse: {text:?}");
        ProviderError::InvalidResponse(err.to_string())
    })?;

    parsed
        .response
        .ok_or_else(|| ProviderError::InvalidResponse("response field missing".to_string()))
}

impl EmbeddingProvider for OllamaClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = self.post(
            "/api/embeddings",
            &EmbeddingRequest {
                model: &self.model,
                prompt: text,
            },
        )?;
        parse_embedding_response(&body)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

impl CompletionProvider for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = self.post(
            "/api/generate",
            &GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerateOptions { temperature: 0.0 },
                format: self.json_mode.then_some("json"),
            },
        )?;
        parse_generate_response(&body)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
