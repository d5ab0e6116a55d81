//! Ollama generate API client

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{SummaryError, Summarizer};

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_MODEL: &str = "gemma3n";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(10);

/// Request to /api/generate
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

/// Response from /api/generate
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Response from /api/tags
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: Option<String>,
    model: Option<String>,
}

/// Client for a local Ollama server
pub struct OllamaClient {
    base_url: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Names of installed models; empty when the server cannot be asked
    pub async fn list_models(&self) -> Vec<String> {
        let response = match self
            .client
            .get(self.endpoint("api/tags"))
            .timeout(LIST_MODELS_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            _ => return Vec::new(),
        };

        match response.json::<TagsResponse>().await {
            Ok(tags) => tags
                .models
                .into_iter()
                .filter_map(|m| m.name.or(m.model))
                .filter(|name| !name.is_empty())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Call /api/generate and return the full response text
    pub async fn generate(&self, system: &str, prompt: &str) -> Result<String, SummaryError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint("api/generate"))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| SummaryError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SummaryError::ModelNotFound {
                model: self.model.clone(),
                available: self.list_models().await,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummaryError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let result: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SummaryError::Unreachable(e.to_string())
            } else {
                SummaryError::Decode(e.to_string())
            }
        })?;

        let text = result.response.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(SummaryError::Empty);
        }
        Ok(text)
    }
}

#[async_trait]
impl Summarizer for OllamaClient {
    async fn summarize(&self, system: &str, prompt: &str) -> Result<String, SummaryError> {
        self.generate(system, prompt).await
    }
}
