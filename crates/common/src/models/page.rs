//! Result pages and the response envelope built from them

use serde::{Deserialize, Serialize};

use super::{ArticleSummary, SearchHit, SearchQuery};

/// One page of ranked hits as returned by a search backend
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResultPage {
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub total_hits: u64,
    pub page: u32,
    pub size: u32,
    /// Engine-reported execution time
    pub took_ms: u64,
}

impl SearchResultPage {
    /// Build a page for `query`. Hits beyond the page size are discarded.
    pub fn new(query: &SearchQuery, mut hits: Vec<SearchHit>, total_hits: u64, took_ms: u64) -> Self {
        hits.truncate(query.size() as usize);
        Self {
            query: query.text().to_string(),
            hits,
            total_hits,
            page: query.page(),
            size: query.size(),
            took_ms,
        }
    }
}

/// Paginated search response returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub query: String,
    pub total_hits: u64,
    pub page: u32,
    pub size: u32,
    /// `ceil(total_hits / size)`, and 0 when nothing matched
    pub total_pages: u64,
    pub has_next: bool,
    pub took_ms: u64,
    pub results: Vec<ArticleSummary>,
}
