//! Language model inference
//!
//! Provides a unified interface over inference services:
//! - Ollama-compatible REST endpoints (streaming and non-streaming)
//! - A mock backend for development and tests
//!
//! [`GenerationClient`] sits in front of a backend and enforces option
//! validation and model availability before any generation call is made.

mod mock;
mod ollama;

pub use mock::{MockFailure, MockInferenceBackend};
pub use ollama::OllamaClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use validator::Validate;

use crate::config::{LlmConfig, LlmProvider};
use crate::errors::{AppError, Result};

/// A model offered by the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,

    /// Size on disk in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    /// e.g. "500M"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_size: Option<String>,
}

/// Sampling options for one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GenerationOptions {
    #[validate(range(min = 1, max = 8192, message = "max_tokens must be between 1 and 8192"))]
    pub max_tokens: u32,

    #[validate(range(min = 0.0, max = 2.0, message = "temperature must be between 0.0 and 2.0"))]
    pub temperature: f32,

    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub options: GenerationOptions,
}

/// How a generation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Complete,
    /// Stopped at the token limit
    Truncated,
    /// The stream broke off before completion; text is partial
    Failed,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Complete => "complete",
            CompletionStatus::Truncated => "truncated",
            CompletionStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model: String,
    pub status: CompletionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Trait for inference services
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Models currently available
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Run one generation. The model is assumed to exist.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult>;

    /// Check the service is reachable
    async fn ping(&self) -> Result<()>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Whether `requested` names one of `available`. A bare name matches its
/// `:latest` tag.
pub fn model_matches(requested: &str, available: &str) -> bool {
    requested == available
        || (!requested.contains(':')
            && available
                .strip_suffix(":latest")
                .is_some_and(|base| base == requested))
}

/// Validating front for an inference backend
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn InferenceBackend>,
    default_model: String,
    default_max_tokens: u32,
    default_temperature: f32,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn InferenceBackend>, config: &LlmConfig) -> Self {
        Self {
            backend,
            default_model: config.default_model.clone(),
            default_max_tokens: config.default_max_tokens,
            default_temperature: config.default_temperature,
        }
    }

    pub fn backend(&self) -> &Arc<dyn InferenceBackend> {
        &self.backend
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// The requested model, or the configured default when none was named.
    /// Never substitutes a named model.
    pub fn resolve_model(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model)
            .to_string()
    }

    /// Options with configured defaults filled in
    pub fn options(&self, max_tokens: Option<u32>, temperature: Option<f32>, stream: bool) -> GenerationOptions {
        GenerationOptions {
            max_tokens: max_tokens.unwrap_or(self.default_max_tokens),
            temperature: temperature.unwrap_or(self.default_temperature),
            stream,
        }
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.backend.list_models().await
    }

    /// Fail with `InvalidModel` unless `model` is offered by the service
    pub async fn check_model(&self, model: &str) -> Result<()> {
        let models = self.backend.list_models().await?;
        if models.iter().any(|m| model_matches(model, &m.name)) {
            return Ok(());
        }

        tracing::warn!(model = model, available = models.len(), "Requested model is not available");
        Err(AppError::InvalidModel {
            model: model.to_string(),
            available: models.into_iter().map(|m| m.name).collect(),
        })
    }

    /// Validate, check the model, then generate
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        request.options.validate()?;
        self.check_model(&request.model).await?;
        self.generate_checked(request).await
    }

    /// Generate for a request whose options and model were already checked
    pub async fn generate_checked(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let start = Instant::now();
        let outcome = self.backend.generate(request).await;
        let elapsed = start.elapsed();

        match &outcome {
            Ok(result) => {
                tracing::info!(
                    model = %request.model,
                    status = result.status.as_str(),
                    stream = request.options.stream,
                    latency_ms = elapsed.as_millis() as u64,
                    "Generation complete"
                );
                crate::metrics::record_generation(elapsed.as_secs_f64(), &request.model, result.status.as_str(), true);
            }
            Err(e) => {
                tracing::error!(
                    model = %request.model,
                    error = %e,
                    latency_ms = elapsed.as_millis() as u64,
                    "Generation failed"
                );
                crate::metrics::record_generation(elapsed.as_secs_f64(), &request.model, "error", false);
            }
        }

        outcome
    }
}

/// Create an inference backend based on configuration
pub fn create_inference_backend(config: &LlmConfig) -> Result<Arc<dyn InferenceBackend>> {
    match config.provider {
        LlmProvider::Ollama => {
            tracing::info!(base_url = %config.base_url, "Using Ollama inference backend");
            Ok(Arc::new(OllamaClient::new(config)?))
        }
        LlmProvider::Mock => {
            tracing::warn!("Using mock inference backend");
            Ok(Arc::new(MockInferenceBackend::new(vec![config.default_model.clone()])))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(backend: Arc<MockInferenceBackend>) -> GenerationClient {
        GenerationClient::new(backend, &LlmConfig::default())
    }

    fn request(model: &str, max_tokens: u32, temperature: f32) -> GenerationRequest {
        GenerationRequest {
            model: model.to_string(),
            prompt: "Hello".to_string(),
            options: GenerationOptions {
                max_tokens,
                temperature,
                stream: false,
            },
        }
    }

    #[test]
    fn test_model_matches() {
        assert!(model_matches("qwen:0.5b", "qwen:0.5b"));
        assert!(model_matches("llama3", "llama3:latest"));
        assert!(!model_matches("llama3:8b", "llama3:latest"));
        assert!(!model_matches("qwen", "qwen:0.5b"));
    }

    #[test]
    fn test_resolve_model_never_substitutes() {
        let c = client(Arc::new(MockInferenceBackend::new(vec!["qwen:0.5b".into()])));
        assert_eq!(c.resolve_model(None), "qwen:0.5b");
        assert_eq!(c.resolve_model(Some(" ")), "qwen:0.5b");
        assert_eq!(c.resolve_model(Some("mistral")), "mistral");
    }

    #[tokio::test]
    async fn test_unknown_model_rejected_without_generation() {
        let backend = Arc::new(MockInferenceBackend::new(vec!["qwen:0.5b".into()]));
        let c = client(backend.clone());

        let err = c.generate(&request("gpt-17", 100, 0.7)).await.unwrap_err();
        match err {
            AppError::InvalidModel { model, available } => {
                assert_eq!(model, "gpt-17");
                assert_eq!(available, vec!["qwen:0.5b"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(backend.generate_calls(), 0);
        assert_eq!(backend.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_options_rejected_before_network() {
        let backend = Arc::new(MockInferenceBackend::new(vec!["qwen:0.5b".into()]));
        let c = client(backend.clone());

        assert!(matches!(
            c.generate(&request("qwen:0.5b", 0, 0.7)).await.unwrap_err(),
            AppError::Validation { .. }
        ));
        assert!(matches!(
            c.generate(&request("qwen:0.5b", 10, 2.5)).await.unwrap_err(),
            AppError::Validation { .. }
        ));
        assert_eq!(backend.list_calls(), 0);
        assert_eq!(backend.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_with_valid_model() {
        let backend = Arc::new(MockInferenceBackend::new(vec!["qwen:0.5b".into()]));
        let result = client(backend.clone()).generate(&request("qwen:0.5b", 100, 0.0)).await.unwrap();
        assert_eq!(result.model, "qwen:0.5b");
        assert_eq!(result.status, CompletionStatus::Complete);
        assert_eq!(backend.generate_calls(), 1);
    }
}
