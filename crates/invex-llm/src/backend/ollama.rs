//! Ollama HTTP backend for local model inference.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::GenerationError;
use crate::{GenerationBackend, Result};

/// Default address of a local Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// Default model used by the extraction prompts.
pub const DEFAULT_MODEL: &str = "gemma3n:e2b";

/// Backend calling `/api/generate` on an Ollama server.
pub struct OllamaBackend {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    temperature: Option<f32>,
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaBackend {
    /// Create a backend for the given server and model.
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GenerationError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
            temperature: None,
        })
    }

    /// Local server with the default model and a 5-minute timeout.
    pub fn default_local() -> Result<Self> {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL, 300)
    }

    /// Set the sampling temperature sent with each request.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Server address without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the model names installed on the server.
    pub fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TagsResponse = response
            .json()
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    fn map_transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout {
                secs: self.timeout_secs,
            }
        } else if e.is_connect() {
            GenerationError::Unavailable(self.base_url.clone())
        } else {
            GenerationError::Unavailable(e.to_string())
        }
    }
}

impl GenerationBackend for OllamaBackend {
    fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self.temperature.map(|temperature| GenerateOptions { temperature }),
        };

        debug!("Sending {} char prompt to {} ({})", prompt.len(), self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        if parsed.response.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        trace!("Model answered with {} chars", parsed.response.len());
        Ok(parsed.response)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
