//! Ollama-compatible inference client
//!
//! The base URL includes the `/api` prefix (`http://localhost:11434/api`).
//! Streaming responses are newline-delimited JSON chunks, the last of which
//! carries `done: true` together with token counts.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CompletionStatus, GenerationRequest, GenerationResult, InferenceBackend, ModelInfo, TokenUsage};
use crate::config::LlmConfig;
use crate::errors::{AppError, Result};

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Serialize)]
struct SamplingOptions {
    temperature: f32,
    num_predict: u32,
}

/// One generate response, or one chunk of a streamed response
#[derive(Debug, Default, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

impl GenerateChunk {
    fn status(&self) -> CompletionStatus {
        match self.done_reason.as_deref() {
            Some("length") => CompletionStatus::Truncated,
            _ => CompletionStatus::Complete,
        }
    }

    fn usage(&self) -> Option<TokenUsage> {
        match (self.prompt_eval_count, self.eval_count) {
            (None, None) => None,
            (prompt, completion) => Some(TokenUsage::new(prompt.unwrap_or(0), completion.unwrap_or(0))),
        }
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Deserialize)]
struct TagDetails {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    parameter_size: Option<String>,
}

impl From<TagEntry> for ModelInfo {
    fn from(tag: TagEntry) -> Self {
        let (family, parameter_size) = match tag.details {
            Some(details) => (details.family, details.parameter_size),
            None => (None, None),
        };
        ModelInfo {
            name: tag.name,
            size: tag.size,
            family,
            parameter_size,
        }
    }
}

/// Client for an Ollama-compatible inference service
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaClient {
    /// Create a client from configuration
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Self::with_base_url(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::ModelTimeout { timeout_ms: self.timeout_ms() }
        } else {
            AppError::ModelUnavailable {
                message: format!("Request failed: {}", e),
            }
        }
    }

    /// Map an error status, recognising the service's "model not found" reply
    async fn status_error(&self, model: &str, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::NOT_FOUND && body.contains("not found") {
            return AppError::InvalidModel {
                model: model.to_string(),
                available: Vec::new(),
            };
        }

        AppError::ModelUnavailable {
            message: format!("Inference service returned {}: {}", status, body.trim()),
        }
    }

    async fn post_generate(&self, request: &GenerationRequest) -> Result<reqwest::Response> {
        let body = GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            stream: request.options.stream,
            options: SamplingOptions {
                temperature: request.options.temperature,
                num_predict: request.options.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(self.status_error(&request.model, response).await);
        }
        Ok(response)
    }

    async fn generate_once(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let response = self.post_generate(request).await?;
        let chunk: GenerateChunk = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AppError::ModelTimeout { timeout_ms: self.timeout_ms() }
            } else {
                AppError::ModelUnavailable {
                    message: format!("Malformed generate response: {}", e),
                }
            }
        })?;

        if let Some(error) = chunk.error {
            return Err(chunk_error(&request.model, error));
        }

        Ok(GenerationResult {
            status: chunk.status(),
            usage: chunk.usage(),
            text: chunk.response,
            model: request.model.clone(),
        })
    }

    async fn generate_streaming(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let response = self.post_generate(request).await?;
        let mut stream = response.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        let mut text = String::new();
        let mut last: Option<GenerateChunk> = None;

        'read: loop {
            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let chunk: GenerateChunk = serde_json::from_str(line).map_err(|e| AppError::ModelUnavailable {
                    message: format!("Malformed stream chunk: {}", e),
                })?;

                if let Some(error) = chunk.error {
                    if text.is_empty() {
                        return Err(chunk_error(&request.model, error));
                    }
                    tracing::warn!(model = %request.model, error = %error, "Generation stream reported an error");
                    break 'read;
                }

                text.push_str(&chunk.response);
                let done = chunk.done;
                last = Some(chunk);
                if done {
                    break 'read;
                }
            }

            match stream.next().await {
                Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                Some(Err(e)) if e.is_timeout() => {
                    return Err(AppError::ModelTimeout { timeout_ms: self.timeout_ms() })
                }
                Some(Err(e)) => {
                    tracing::warn!(model = %request.model, error = %e, "Generation stream interrupted");
                    break 'read;
                }
                None => {
                    // a final chunk without a trailing newline
                    let rest = String::from_utf8_lossy(&buf).trim().to_string();
                    buf.clear();
                    if !rest.is_empty() {
                        if let Ok(chunk) = serde_json::from_str::<GenerateChunk>(&rest) {
                            text.push_str(&chunk.response);
                            last = Some(chunk);
                        }
                    }
                    break 'read;
                }
            }
        }

        let (status, usage) = match &last {
            Some(chunk) if chunk.done => (chunk.status(), chunk.usage()),
            _ => (CompletionStatus::Failed, None),
        };

        Ok(GenerationResult {
            text,
            model: request.model.clone(),
            status,
            usage,
        })
    }
}

fn chunk_error(model: &str, error: String) -> AppError {
    if error.contains("not found") {
        AppError::InvalidModel {
            model: model.to_string(),
            available: Vec::new(),
        }
    } else {
        AppError::ModelUnavailable { message: error }
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(format!("{}/tags", self.base_url))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(AppError::ModelUnavailable {
                message: format!("Model listing returned {}", response.status()),
            });
        }

        let tags: TagsResponse = response.json().await.map_err(|e| AppError::ModelUnavailable {
            message: format!("Malformed model listing: {}", e),
        })?;
        Ok(tags.models.into_iter().map(ModelInfo::from).collect())
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let call = async {
            if request.options.stream {
                self.generate_streaming(request).await
            } else {
                self.generate_once(request).await
            }
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| AppError::ModelTimeout { timeout_ms: self.timeout_ms() })?
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/version", self.base_url))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(AppError::ModelUnavailable {
                message: format!("Inference service ping returned {}", response.status()),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
