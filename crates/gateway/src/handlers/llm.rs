//! Generation handlers

use axum::{extract::State, Json};

use crate::AppState;
use organa_common::{
    errors::Result,
    llm::{GenerationResult, ModelInfo},
    orchestrator::{
        AnalyzeRequest, AnalyzeResponse, AnswerRequest, AnswerResponse, GenerateRequest,
        SummarizeRequest,
    },
};

/// Models offered by the inference service
pub async fn models(State(state): State<AppState>) -> Result<Json<Vec<ModelInfo>>> {
    let models = state.orchestrator.list_models().await?;
    Ok(Json(models))
}

/// Free-form generation
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerationResult>> {
    let result = state.orchestrator.generate(request).await?;
    Ok(Json(result))
}

/// Summary of caller-supplied articles
pub async fn summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<GenerationResult>> {
    let result = state.orchestrator.summarize(request).await?;
    Ok(Json(result))
}

/// Overview of a query's results
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>> {
    let response = state.orchestrator.analyze(request).await?;
    Ok(Json(response))
}

/// Search, assemble context, then answer
pub async fn answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>> {
    tracing::info!(question = %request.question, "Answer requested");
    let response = state.orchestrator.answer(request).await?;
    Ok(Json(response))
}
