//! Ollama HTTP client
//!
//! Non-streaming `/api/generate` with two timeout layers: a fixed 5s connect
//! timeout on the HTTP client, and an independent watchdog
//! (`tokio::time::timeout`) racing the whole call. The watchdog does not
//! trust the transport's own timeouts: a hang anywhere between connect and
//! response parsing still fails within the configured budget. On expiry the
//! in-flight future is dropped and the event is appended to an operational
//! log for offline diagnosis.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{GenerateRequest, GenerationClient, base_url};
use crate::error::{MarginaliaError, Result};
use crate::id::now_local_iso;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const LIST_TIMEOUT: Duration = Duration::from_secs(5);
const TEMPERATURE: f64 = 0.7;

/// Operational log of watchdog expiries, under the data directory.
/// Append-only and never read back.
pub const TIMEOUT_LOG_FILE: &str = "ollama_timeout.log";

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// HTTP client for an Ollama-compatible model server.
pub struct OllamaClient {
    http: reqwest::Client,
    timeout_log: PathBuf,
}

impl OllamaClient {
    /// Create a client. `data_dir` hosts the timeout log.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                MarginaliaError::ConnectionFailed(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            http,
            timeout_log: data_dir.into().join(TIMEOUT_LOG_FILE),
        })
    }

    fn log_timeout(&self, model: &str, hard_timeout: Duration, url: &str) {
        let line = format!(
            "[{}] model='{}' hard-timeout={}s url={}\n",
            now_local_iso(),
            model,
            hard_timeout.as_secs(),
            url
        );
        let appended = self
            .timeout_log
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.timeout_log)
            })
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = appended {
            log::warn!(
                "failed to append timeout log {}: {}",
                self.timeout_log.display(),
                e
            );
        }
    }

    async fn do_generate(&self, url: &str, request: &GenerateRequest) -> Result<String> {
        let body = json!({
            "model": request.model,
            "prompt": request.prompt,
            "system": request.system,
            "stream": false,
            "options": { "temperature": TEMPERATURE },
        });

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MarginaliaError::GenerationFailed(e.to_string()))?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| MarginaliaError::GenerationFailed(e.to_string()))?;

        Ok(parsed.response.trim().to_string())
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn list_models(&self, server: &str, port: u16) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", base_url(server, port));

        let response = self
            .http
            .get(&url)
            .timeout(LIST_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MarginaliaError::ConnectionFailed(e.to_string()))?;

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| MarginaliaError::ConnectionFailed(e.to_string()))?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| m.name)
            .filter(|n| !n.is_empty())
            .collect())
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let url = format!("{}/api/generate", base_url(&request.server, request.port));

        match tokio::time::timeout(request.hard_timeout, self.do_generate(&url, request)).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "generation timed out: model='{}' hard-timeout={}s url={}",
                    request.model,
                    request.hard_timeout.as_secs(),
                    url
                );
                self.log_timeout(&request.model, request.hard_timeout, &url);
                Err(MarginaliaError::Timeout {
                    model: request.model.clone(),
                    timeout_secs: request.hard_timeout.as_secs(),
                })
            }
        }
    }
}
