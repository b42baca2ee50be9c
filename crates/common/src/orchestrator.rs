//! Retrieval-to-generation orchestration
//!
//! Each public method is one request flow. Flows share nothing mutable: the
//! orchestrator only holds the backends (behind `Arc`) and fixed settings.
//!
//! Failure handling:
//! - Validation happens before any network call
//! - A search failure fails the flow immediately; nothing is generated
//!   without retrieved context
//! - A generation failure after a successful search is reported as
//!   [`AppError::GenerationStage`], carrying the search results

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use validator::Validate;

use crate::config::AppConfig;
use crate::context::{prompt, truncate_at_word, ContextAssembler, ContextDocument, PromptContext};
use crate::errors::{AppError, Result};
use crate::llm::{
    create_inference_backend, CompletionStatus, GenerationClient, GenerationRequest,
    GenerationResult, InferenceBackend, ModelInfo, TokenUsage,
};
use crate::models::{
    ArticleDetail, ArticleId, ArticleSummary, FilterSet, IndexStats, ResponseEnvelope, SearchHit, SearchQuery,
    SearchResultPage,
};
use crate::search::{create_search_backend, Paginator, QueryBuilder, SearchBackend, MAX_QUERY_CHARS};

/// Default and maximum number of similar articles
pub const DEFAULT_SIMILAR: i64 = 5;
pub const MAX_SIMILAR: i64 = 20;

/// Grounded question answering over the index
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AnswerRequest {
    #[validate(length(min = 1, max = 1000, message = "question must be 1-1000 characters"))]
    pub question: String,

    #[serde(default)]
    pub filters: FilterSet,

    /// Hits to retrieve and feed into the context
    #[validate(range(min = 1, message = "top_k must be at least 1"))]
    pub top_k: Option<u32>,

    pub model: Option<String>,

    #[validate(range(min = 1, max = 8192))]
    pub max_tokens: Option<u32>,

    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub stream: bool,

    /// Include full text in the context (overrides configuration)
    pub deep_context: Option<bool>,
}

/// Shape of the context used for an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub empty: bool,
    pub documents: usize,
    pub used_chars: usize,
    pub budget_chars: usize,
    pub dropped: usize,
    pub truncated: bool,
}

impl From<&PromptContext> for ContextSummary {
    fn from(context: &PromptContext) -> Self {
        Self {
            empty: context.is_empty(),
            documents: context.entries.len(),
            used_chars: context.used,
            budget_chars: context.budget,
            dropped: context.dropped,
            truncated: context.truncated(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub question: String,
    /// `None` when nothing was retrieved and no generation was attempted
    pub answer: Option<String>,
    pub status: Option<CompletionStatus>,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub context: ContextSummary,
    pub results: ResponseEnvelope,
}

/// Summary of caller-supplied articles
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SummarizeRequest {
    #[validate(length(min = 1, message = "at least one document is required"))]
    pub documents: Vec<ContextDocument>,

    pub model: Option<String>,

    #[validate(range(min = 1, max = 8192))]
    pub max_tokens: Option<u32>,

    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub stream: bool,
}

/// Search overview for a query and the documents it returned
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AnalyzeRequest {
    #[validate(length(min = 1, max = 1000, message = "query must be 1-1000 characters"))]
    pub query: String,

    #[validate(length(min = 1, message = "at least one document is required"))]
    pub documents: Vec<ContextDocument>,

    pub model: Option<String>,

    #[validate(range(min = 1, max = 8192))]
    pub max_tokens: Option<u32>,

    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub query: String,
    pub response: String,
    pub model_used: String,
    pub status: CompletionStatus,
    pub token_usage: Option<TokenUsage>,
}

/// Free-form generation, optionally grounded in documents
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct GenerateRequest {
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub prompt: String,

    pub model: Option<String>,

    #[validate(range(min = 1, max = 8192))]
    pub max_tokens: Option<u32>,

    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub stream: bool,

    #[serde(default)]
    pub documents: Vec<ContextDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyStatus {
    pub backend: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DependencyStatus {
    fn from_ping(backend: &str, outcome: Result<()>) -> Self {
        match outcome {
            Ok(()) => Self {
                backend: backend.to_string(),
                healthy: true,
                error: None,
            },
            Err(e) => Self {
                backend: backend.to_string(),
                healthy: false,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadinessReport {
    pub ready: bool,
    pub search: DependencyStatus,
    pub llm: DependencyStatus,
}

/// Coordinates search, context assembly and generation
pub struct Orchestrator {
    search: Arc<dyn SearchBackend>,
    generation: GenerationClient,
    query_builder: QueryBuilder,
    context_budget: usize,
    deep_context: bool,
    top_k: u32,
    default_page_size: u32,
}

impl Orchestrator {
    pub fn new(search: Arc<dyn SearchBackend>, inference: Arc<dyn InferenceBackend>, config: &AppConfig) -> Self {
        Self {
            search,
            generation: GenerationClient::new(inference, &config.llm),
            query_builder: QueryBuilder::from_config(&config.search),
            context_budget: config.context.budget_chars,
            deep_context: config.context.deep_context,
            top_k: config.context.top_k,
            default_page_size: config.search.default_page_size,
        }
    }

    /// Build the backends named in configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let search = create_search_backend(&config.search)?;
        let inference = create_inference_backend(&config.llm)?;
        Ok(Self::new(search, inference, config))
    }

    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }

    /// Run a query and record metrics
    async fn run_query(&self, query: &SearchQuery) -> Result<SearchResultPage> {
        let start = Instant::now();
        let outcome = self.search.execute(query).await;
        let elapsed = start.elapsed();

        match &outcome {
            Ok(page) => {
                tracing::info!(
                    query = %query.text(),
                    page = query.page(),
                    size = query.size(),
                    hits = page.hits.len(),
                    total_hits = page.total_hits,
                    latency_ms = elapsed.as_millis() as u64,
                    "Search complete"
                );
                crate::metrics::record_search(elapsed.as_secs_f64(), self.search.name(), "ok", page.hits.len());
            }
            Err(e) => {
                tracing::error!(
                    query = %query.text(),
                    error = %e,
                    latency_ms = elapsed.as_millis() as u64,
                    "Search failed"
                );
                crate::metrics::record_search(elapsed.as_secs_f64(), self.search.name(), "error", 0);
            }
        }

        outcome
    }

    fn assemble(&self, documents: &[ContextDocument], deep: bool) -> PromptContext {
        let context = ContextAssembler::new(deep).assemble(documents, self.context_budget);
        crate::metrics::record_context(context.entries.len(), context.used, context.truncated());
        tracing::debug!(
            offered = documents.len(),
            included = context.entries.len(),
            used_chars = context.used,
            budget_chars = context.budget,
            "Context assembled"
        );
        context
    }

    /// Paginated search
    pub async fn search(&self, raw_query: &str, filters: FilterSet, page: i64, size: i64) -> Result<ResponseEnvelope> {
        let query = self.query_builder.build(raw_query, filters, page, size)?;
        let page = self.run_query(&query).await?;
        Ok(Paginator::format(&page))
    }

    /// Single article, full text included
    pub async fn article(&self, raw_id: &str) -> Result<ArticleDetail> {
        let id = ArticleId::parse(raw_id)?;
        let hit = self.search.get_by_id(&id).await?;
        Ok(hit.into_detail())
    }

    /// Articles similar to the given one, by title and keywords
    pub async fn similar(&self, raw_id: &str, size: i64) -> Result<Vec<ArticleSummary>> {
        if !(1..=MAX_SIMILAR).contains(&size) {
            return Err(AppError::validation(
                "size",
                format!("size must be between 1 and {}", MAX_SIMILAR),
            ));
        }

        let id = ArticleId::parse(raw_id)?;
        let article = self.search.get_by_id(&id).await?;

        let text = crate::search::dsl::similar_text(&article.title, &article.keywords);
        let text = truncate_at_word(&text, MAX_QUERY_CHARS);
        if text.is_empty() {
            return Ok(Vec::new());
        }

        // one extra hit, since the article itself usually ranks first
        let fetch = (size + 1).min(i64::from(self.query_builder.max_page_size()));
        let query = self.query_builder.build(text, FilterSet::default(), 1, fetch)?;
        let page = self.run_query(&query).await?;

        Ok(page
            .hits
            .iter()
            .filter(|hit| hit.canonical_id() != article.canonical_id())
            .take(size as usize)
            .map(SearchHit::summary)
            .collect())
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.search.stats().await
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.generation.list_models().await
    }

    /// Ping both upstream services concurrently
    pub async fn readiness(&self) -> ReadinessReport {
        let (search, llm) = tokio::join!(self.search.ping(), self.generation.backend().ping());
        let search = DependencyStatus::from_ping(self.search.name(), search);
        let llm = DependencyStatus::from_ping(self.generation.backend().name(), llm);
        ReadinessReport {
            ready: search.healthy && llm.healthy,
            search,
            llm,
        }
    }

    /// Retrieval-augmented answer
    pub async fn answer(&self, request: AnswerRequest) -> Result<AnswerResponse> {
        request.validate()?;
        let question = request.question.trim();
        if question.is_empty() {
            return Err(AppError::validation("question", "question must not be empty"));
        }

        let options = self
            .generation
            .options(request.max_tokens, request.temperature, request.stream);
        let model = self.generation.resolve_model(request.model.as_deref());
        let top_k = request.top_k.unwrap_or(self.top_k);
        let max_top_k = self.query_builder.max_page_size();
        if top_k > max_top_k {
            return Err(AppError::validation(
                "top_k",
                format!("top_k must be between 1 and {}", max_top_k),
            ));
        }
        let deep = request.deep_context.unwrap_or(self.deep_context);

        let query = self.query_builder.build(question, request.filters, 1, i64::from(top_k))?;
        let page = self.run_query(&query).await?;
        let results = Paginator::format(&page);

        let documents = if deep {
            self.with_full_text(&page.hits).await
        } else {
            page.hits.iter().map(ContextDocument::from).collect()
        };

        let (context, model_check) = tokio::join!(
            async { self.assemble(&documents, deep) },
            self.generation.check_model(&model)
        );

        let generation_stage = |source: AppError, results: &ResponseEnvelope| AppError::GenerationStage {
            source: Box::new(source),
            results: Box::new(results.clone()),
        };

        if let Err(e) = model_check {
            return Err(generation_stage(e, &results));
        }

        if context.is_empty() {
            tracing::info!(question = %question, total_hits = page.total_hits, "No context for answer, skipping generation");
            return Ok(AnswerResponse {
                question: question.to_string(),
                answer: None,
                status: None,
                model,
                usage: None,
                context: ContextSummary::from(&context),
                results,
            });
        }

        let request = GenerationRequest {
            model: model.clone(),
            prompt: prompt::answer_prompt(question, &context),
            options,
        };
        let generated = match self.generation.generate_checked(&request).await {
            Ok(generated) => generated,
            Err(e) => return Err(generation_stage(e, &results)),
        };

        Ok(AnswerResponse {
            question: question.to_string(),
            answer: Some(generated.text),
            status: Some(generated.status),
            model,
            usage: generated.usage,
            context: ContextSummary::from(&context),
            results,
        })
    }

    /// Fetch full articles for context; hits that cannot be fetched are used as-is
    async fn with_full_text(&self, hits: &[SearchHit]) -> Vec<ContextDocument> {
        let fetches = hits.iter().map(|hit| async move {
            let full = match ArticleId::parse(hit.canonical_id()) {
                Ok(id) => self.search.get_by_id(&id).await,
                Err(e) => Err(e),
            };
            match full {
                Ok(article) => ContextDocument::from(&article),
                Err(e) => {
                    tracing::warn!(id = %hit.canonical_id(), error = %e, "Full text unavailable, using abstract");
                    ContextDocument::from(hit)
                }
            }
        });
        join_all(fetches).await
    }

    /// Summary of the supplied documents
    pub async fn summarize(&self, request: SummarizeRequest) -> Result<GenerationResult> {
        request.validate()?;

        let context = self.assemble(&request.documents, false);
        if context.is_empty() {
            return Err(AppError::validation("documents", "no document fits the context budget"));
        }

        let generation = GenerationRequest {
            model: self.generation.resolve_model(request.model.as_deref()),
            prompt: prompt::summary_prompt(&context),
            options: self
                .generation
                .options(request.max_tokens, request.temperature, request.stream),
        };
        self.generation.generate(&generation).await
    }

    /// Overview of what a query is about, from its documents
    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalyzeResponse> {
        request.validate()?;
        let query = request.query.trim();
        if query.is_empty() {
            return Err(AppError::validation("query", "query must not be empty"));
        }

        let context = self.assemble(&request.documents, false);
        if context.is_empty() {
            return Err(AppError::validation("documents", "no document fits the context budget"));
        }

        let generation = GenerationRequest {
            model: self.generation.resolve_model(request.model.as_deref()),
            prompt: prompt::overview_prompt(query, &context),
            options: self.generation.options(request.max_tokens, request.temperature, false),
        };
        let result = self.generation.generate(&generation).await?;

        Ok(AnalyzeResponse {
            query: query.to_string(),
            response: result.text,
            model_used: result.model,
            status: result.status,
            token_usage: result.usage,
        })
    }

    /// Free-form generation
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerationResult> {
        request.validate()?;
        if request.prompt.trim().is_empty() {
            return Err(AppError::validation("prompt", "prompt must not be empty"));
        }

        let prompt = if request.documents.is_empty() {
            request.prompt.clone()
        } else {
            let context = self.assemble(&request.documents, false);
            prompt::with_context(&request.prompt, &context)
        };

        let generation = GenerationRequest {
            model: self.generation.resolve_model(request.model.as_deref()),
            prompt,
            options: self
                .generation
                .options(request.max_tokens, request.temperature, request.stream),
        };
        self.generation.generate(&generation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockFailure, MockInferenceBackend};
    use crate::models::ArticleIds;
    use crate::search::InMemorySearchBackend;
    use std::collections::{BTreeMap, BTreeSet};

    fn article(n: usize, title: &str) -> SearchHit {
        SearchHit {
            ids: ArticleIds {
                pmcid: Some(format!("PMC{}", 1000 + n)),
                ..Default::default()
            },
            title: title.to_string(),
            abstract_text: Some(format!("Findings on {} number {}", title.to_lowercase(), n)),
            full_text: Some(format!("Full text {n}")),
            authors: vec!["R. Franklin".into()],
            journal: Some("Oncology".into()),
            keywords: ["oncology".to_string()].into_iter().collect::<BTreeSet<_>>(),
            publication_date: None,
            article_type: Some("research-article".into()),
            score: None,
            highlights: BTreeMap::new(),
        }
    }

    fn corpus() -> Vec<SearchHit> {
        let mut docs: Vec<SearchHit> = (0..25).map(|n| article(n, "Cancer therapy")).collect();
        docs.push(article(90, "Malaria vaccines"));
        docs
    }

    struct Fixture {
        search: Arc<InMemorySearchBackend>,
        llm: Arc<MockInferenceBackend>,
        orchestrator: Orchestrator,
    }

    fn fixture_with(search: InMemorySearchBackend, llm: MockInferenceBackend) -> Fixture {
        let search = Arc::new(search);
        let llm = Arc::new(llm);
        let orchestrator = Orchestrator::new(search.clone(), llm.clone(), &AppConfig::default());
        Fixture { search, llm, orchestrator }
    }

    fn fixture() -> Fixture {
        fixture_with(
            InMemorySearchBackend::new(corpus()),
            MockInferenceBackend::new(vec!["qwen:0.5b".into()]),
        )
    }

    #[tokio::test]
    async fn test_search_paginates() {
        let f = fixture();
        let envelope = f.orchestrator.search("cancer", FilterSet::default(), 1, 10).await.unwrap();
        assert_eq!(envelope.total_hits, 25);
        assert_eq!(envelope.total_pages, 3);
        assert_eq!(envelope.results.len(), 10);
        assert!(envelope.has_next);

        let last = f.orchestrator.search("cancer", FilterSet::default(), 3, 10).await.unwrap();
        assert_eq!(last.results.len(), 5);
        assert!(!last.has_next);
    }

    #[tokio::test]
    async fn test_invalid_search_makes_no_call() {
        let f = fixture();
        assert!(f.orchestrator.search(" ", FilterSet::default(), 1, 10).await.is_err());
        assert_eq!(f.search.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_article_lookup() {
        let f = fixture();
        let detail = f.orchestrator.article("pmc1003").await.unwrap();
        assert_eq!(detail.id, "PMC1003");
        assert_eq!(detail.article.full_text.as_deref(), Some("Full text 3"));

        let err = f.orchestrator.article("PMC9999999").await.unwrap_err();
        assert!(matches!(err, AppError::ArticleNotFound { .. }));
    }

    #[tokio::test]
    async fn test_similar_excludes_self() {
        let f = fixture();
        let similar = f.orchestrator.similar("PMC1000", 5).await.unwrap();
        assert_eq!(similar.len(), 5);
        assert!(similar.iter().all(|s| s.id != "PMC1000"));

        assert!(f.orchestrator.similar("PMC1000", 0).await.is_err());
        assert!(f.orchestrator.similar("PMC1000", 21).await.is_err());
    }

    #[tokio::test]
    async fn test_answer_generates_from_context() {
        let f = fixture();
        let response = f
            .orchestrator
            .answer(AnswerRequest {
                question: "cancer therapy outcomes".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(response.answer.is_some());
        assert_eq!(response.status, Some(CompletionStatus::Complete));
        assert_eq!(response.model, "qwen:0.5b");
        assert_eq!(response.results.results.len(), 5);
        assert!(!response.context.empty);
        assert!(response.context.used_chars <= response.context.budget_chars);
        assert_eq!(f.llm.generate_calls(), 1);
    }

    #[tokio::test]
    async fn test_answer_without_hits_skips_generation() {
        let f = fixture();
        let response = f
            .orchestrator
            .answer(AnswerRequest {
                question: "zebrafish regeneration".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.answer, None);
        assert!(response.context.empty);
        assert_eq!(response.results.total_hits, 0);
        assert_eq!(f.llm.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_answer_search_failure_fails_fast() {
        let f = fixture_with(
            InMemorySearchBackend::unavailable(),
            MockInferenceBackend::new(vec!["qwen:0.5b".into()]),
        );
        let err = f
            .orchestrator
            .answer(AnswerRequest {
                question: "cancer".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::SearchUnavailable { .. }));
        assert_eq!(f.llm.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_answer_generation_failure_keeps_results() {
        let f = fixture_with(
            InMemorySearchBackend::new(corpus()),
            MockInferenceBackend::new(vec!["qwen:0.5b".into()]).failing(MockFailure::Timeout),
        );
        let err = f
            .orchestrator
            .answer(AnswerRequest {
                question: "cancer".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        match &err {
            AppError::GenerationStage { source, results } => {
                assert!(matches!(**source, AppError::ModelTimeout { .. }));
                assert_eq!(results.total_hits, 25);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.details().unwrap()["stage"], "generation");
    }

    #[tokio::test]
    async fn test_answer_unknown_model_never_generates() {
        let f = fixture();
        let err = f
            .orchestrator
            .answer(AnswerRequest {
                question: "cancer".into(),
                model: Some("llama-70b".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err.code(), crate::errors::ErrorCode::InvalidModel));
        assert_eq!(f.llm.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_answer_deep_context_uses_full_text() {
        let f = fixture();
        let response = f
            .orchestrator
            .answer(AnswerRequest {
                question: "malaria".into(),
                deep_context: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.context.documents, 1);
        assert_eq!(f.llm.generate_calls(), 1);
        let prompt = f.llm.last_prompt().unwrap();
        assert!(prompt.contains("Full text: Full text 90"));
    }

    #[tokio::test]
    async fn test_answer_shallow_context_omits_full_text() {
        let f = fixture();
        f.orchestrator
            .answer(AnswerRequest {
                question: "malaria".into(),
                deep_context: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        let prompt = f.llm.last_prompt().unwrap();
        assert!(prompt.contains("Malaria vaccines"));
        assert!(!prompt.contains("Full text:"));
    }

    #[tokio::test]
    async fn test_answer_unknown_model_without_hits_is_reported() {
        let f = fixture();
        let err = f
            .orchestrator
            .answer(AnswerRequest {
                question: "zebrafish regeneration".into(),
                model: Some("no-such-model".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), crate::errors::ErrorCode::InvalidModel);
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        match &err {
            AppError::GenerationStage { source, results } => {
                assert!(matches!(**source, AppError::InvalidModel { ref model, .. } if model == "no-such-model"));
                assert_eq!(results.total_hits, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(f.llm.list_calls(), 1);
        assert_eq!(f.llm.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_answer_top_k_out_of_range_rejected() {
        let f = fixture();
        for top_k in [0, 99] {
            let err = f
                .orchestrator
                .answer(AnswerRequest {
                    question: "cancer".into(),
                    top_k: Some(top_k),
                    ..Default::default()
                })
                .await
                .unwrap_err();
            assert!(
                matches!(&err, AppError::Validation { field: Some(field), .. } if field == "top_k"),
                "top_k={top_k}: {err:?}"
            );
        }
        assert_eq!(f.search.search_calls(), 0);
        assert_eq!(f.llm.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_summarize_empty_list_rejected() {
        let f = fixture();
        let err = f.orchestrator.summarize(SummarizeRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(f.llm.generate_calls(), 0);
        assert_eq!(f.llm.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_summarize_documents() {
        let f = fixture();
        let result = f
            .orchestrator
            .summarize(SummarizeRequest {
                documents: vec![ContextDocument {
                    title: "Aspirin and colorectal cancer".into(),
                    abstract_text: Some("Daily aspirin lowers incidence.".into()),
                    full_text: None,
                }],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.status, CompletionStatus::Complete);
        assert_eq!(f.llm.generate_calls(), 1);
    }

    #[tokio::test]
    async fn test_analyze_returns_overview() {
        let f = fixture();
        let response = f
            .orchestrator
            .analyze(AnalyzeRequest {
                query: "statins".into(),
                documents: vec![ContextDocument {
                    title: "Statins in the elderly".into(),
                    abstract_text: None,
                    full_text: None,
                }],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.query, "statins");
        assert_eq!(response.model_used, "qwen:0.5b");
        assert!(response.token_usage.is_some());
    }

    #[tokio::test]
    async fn test_generate_rejects_bad_options() {
        let f = fixture();
        let err = f
            .orchestrator
            .generate(GenerateRequest {
                prompt: "Hello".into(),
                temperature: Some(3.0),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(f.llm.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_readiness() {
        let f = fixture();
        let report = f.orchestrator.readiness().await;
        assert!(report.ready);

        let down = fixture_with(
            InMemorySearchBackend::unavailable(),
            MockInferenceBackend::new(vec![]),
        );
        let report = down.orchestrator.readiness().await;
        assert!(!report.ready);
        assert!(!report.search.healthy);
        assert!(report.llm.healthy);
    }
}
