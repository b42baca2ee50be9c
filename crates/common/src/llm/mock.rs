//! Canned inference backend for development and tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{CompletionStatus, GenerationRequest, GenerationResult, InferenceBackend, ModelInfo, TokenUsage};
use crate::errors::{AppError, Result};

/// Failure injected into every `generate` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Unavailable,
    Timeout,
}

/// Mock inference backend for testing
pub struct MockInferenceBackend {
    models: Vec<String>,
    failure: Option<MockFailure>,
    generate_calls: AtomicUsize,
    list_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockInferenceBackend {
    pub fn new(models: Vec<String>) -> Self {
        Self {
            models,
            failure: None,
            generate_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Make every generation fail the given way
    pub fn failing(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Prompt of the most recent `generate` call
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|prompts| prompts.last().cloned())
    }
}

#[async_trait]
impl InferenceBackend for MockInferenceBackend {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .models
            .iter()
            .map(|name| ModelInfo {
                name: name.clone(),
                size: None,
                family: Some("mock".to_string()),
                parameter_size: None,
            })
            .collect())
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }

        match self.failure {
            Some(MockFailure::Unavailable) => {
                return Err(AppError::ModelUnavailable {
                    message: "mock inference service is down".to_string(),
                })
            }
            Some(MockFailure::Timeout) => return Err(AppError::ModelTimeout { timeout_ms: 60_000 }),
            None => {}
        }

        let prompt_tokens = request.prompt.split_whitespace().count() as u32;
        let text = format!(
            "Mock response from {} for a prompt of {} words.",
            request.model, prompt_tokens
        );
        let completion_tokens = (text.split_whitespace().count() as u32).min(request.options.max_tokens);

        Ok(GenerationResult {
            text,
            model: request.model.clone(),
            status: CompletionStatus::Complete,
            usage: Some(TokenUsage::new(prompt_tokens, completion_tokens)),
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GenerationOptions;
    use tokio_test::assert_err;

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "qwen:0.5b".into(),
            prompt: "one two three".into(),
            options: GenerationOptions {
                max_tokens: 50,
                temperature: 0.7,
                stream: false,
            },
        }
    }

    #[tokio::test]
    async fn test_mock_generate() {
        let backend = MockInferenceBackend::new(vec!["qwen:0.5b".into()]);
        let result = backend.generate(&request()).await.unwrap();
        assert_eq!(result.usage.unwrap().prompt_tokens, 3);
        assert_eq!(backend.generate_calls(), 1);
        assert_eq!(backend.last_prompt().as_deref(), Some("one two three"));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let backend = MockInferenceBackend::new(vec![]).failing(MockFailure::Timeout);
        let err = assert_err!(backend.generate(&request()).await);
        assert!(matches!(err, AppError::ModelTimeout { .. }));
    }
}
