//! AI summarization
//!
//! Provides:
//! - The `Summarizer` boundary used by the report renderer
//! - A client for a local Ollama server

mod ollama;

pub use ollama::{OllamaClient, DEFAULT_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_TIMEOUT_SECS};

use async_trait::async_trait;
use thiserror::Error;

/// Instructions sent with every digest request
pub const SYSTEM_PROMPT: &str = "You are a concise technical summarizer. Given raw git update data \
(commits and tags per repo), write a short digest: what changed, notable commits or releases, and \
any highlights. Keep it scannable and under 300 words. Use plain text, no markdown headers. If there \
are no new commits for a repo, say so briefly.";

/// Ways the summarization service can fail. Every variant means
/// "service unavailable" to callers.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("service unreachable: {0}")]
    Unreachable(String),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model '{model}' not found")]
    ModelNotFound {
        model: String,
        /// Models installed on the server, if they could be listed
        available: Vec<String>,
    },

    #[error("service returned an empty response")]
    Empty,

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl SummaryError {
    /// Operator hint for a missing model
    pub fn hint(&self) -> Option<String> {
        match self {
            SummaryError::ModelNotFound { model, available } if !available.is_empty() => Some(format!(
                "Model '{}' not found. Available: {}. Use --ollama-model <name>.",
                model,
                available.join(", ")
            )),
            _ => None,
        }
    }
}

/// A text-generation service that condenses a prompt
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, system: &str, prompt: &str) -> Result<String, SummaryError>;
}
