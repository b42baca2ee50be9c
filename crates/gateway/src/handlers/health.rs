//! Health check handlers

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;
use organa_common::errors::AppError;
use organa_common::orchestrator::DependencyStatus;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub latency_ms: u64,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub search: CheckResult,
    pub llm: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<DependencyStatus> for CheckResult {
    fn from(dependency: DependencyStatus) -> Self {
        Self {
            status: if dependency.healthy { "up" } else { "down" }.to_string(),
            backend: dependency.backend,
            error: dependency.error,
        }
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: organa_common::VERSION.to_string(),
    })
}

/// Readiness probe - 503 unless both the search index and the inference
/// service answer
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let start = Instant::now();
    let report = state.orchestrator.readiness().await;

    let status = if report.ready {
        StatusCode::OK
    } else {
        tracing::warn!(
            search = report.search.healthy,
            llm = report.llm.healthy,
            "Readiness check failed"
        );
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = ReadyResponse {
        status: if report.ready { "ready" } else { "not_ready" }.to_string(),
        latency_ms: start.elapsed().as_millis() as u64,
        checks: HealthChecks {
            search: report.search.into(),
            llm: report.llm.into(),
        },
    };

    (status, Json(body))
}

/// Prometheus exposition
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => AppError::NotFound {
            resource_type: "endpoint".to_string(),
            id: "/metrics".to_string(),
        }
        .into_response(),
    }
}
