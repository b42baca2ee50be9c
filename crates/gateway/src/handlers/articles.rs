//! Article search and retrieval handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::AppState;
use organa_common::{
    errors::Result,
    models::{ArticleDetail, ArticleSummary, FilterSet, IndexStats, ResponseEnvelope},
    orchestrator::DEFAULT_SIMILAR,
    search::parse_int_param,
};

/// Query string for `/articles/search`
///
/// Numbers arrive as strings so that malformed values are reported through
/// the regular error envelope.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,

    #[serde(flatten)]
    pub filters: FilterSet,
}

#[derive(Debug, Default, Deserialize)]
pub struct SimilarParams {
    pub size: Option<String>,
}

/// Paginated keyword search
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ResponseEnvelope>> {
    let page = parse_int_param("page", params.page.as_deref(), 1)?;
    let size = parse_int_param(
        "size",
        params.size.as_deref(),
        i64::from(state.orchestrator.default_page_size()),
    )?;
    let query = params.query.as_deref().unwrap_or_default();

    let envelope = state
        .orchestrator
        .search(query, params.filters, page, size)
        .await?;

    Ok(Json(envelope))
}

/// Single article by PMCID, PMID or DOI
pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ArticleDetail>> {
    let article = state.orchestrator.article(&id).await?;
    Ok(Json(article))
}

/// Articles related to the given one
pub async fn similar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<Vec<ArticleSummary>>> {
    let size = parse_int_param("size", params.size.as_deref(), DEFAULT_SIMILAR)?;
    let articles = state.orchestrator.similar(&id, size).await?;
    Ok(Json(articles))
}

/// Index size and document count
pub async fn stats(State(state): State<AppState>) -> Result<Json<IndexStats>> {
    let stats = state.orchestrator.stats().await?;
    Ok(Json(stats))
}
