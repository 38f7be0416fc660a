//! Model server client
//!
//! The scheduler talks to the model server through the `GenerationClient`
//! trait so tests can substitute a mock. The real implementation is the
//! Ollama HTTP client in [`ollama`].

pub mod ollama;

pub use ollama::OllamaClient;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Everything needed for one non-streaming generation call.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub server: String,
    pub port: u16,
    pub model: String,
    pub system: String,
    pub prompt: String,
    /// Hard wall-clock budget for the entire call.
    pub hard_timeout: Duration,
}

/// Client for a model-serving endpoint.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Model names the server currently reports.
    async fn list_models(&self, server: &str, port: u16) -> Result<Vec<String>>;

    /// Single non-streaming completion. Returns the trimmed response text;
    /// an empty string means the model produced no content and the caller
    /// must not record a comment.
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

/// Base URL for a model server, defaulting blank hosts to loopback.
pub fn base_url(server: &str, port: u16) -> String {
    let server = server.trim();
    let server = if server.is_empty() { "127.0.0.1" } else { server };
    format!("http://{server}:{port}")
}
