//! Article search
//!
//! Query construction, the search backends and result formatting.

pub mod dsl;
mod elastic;
mod memory;
mod pagination;
mod query;
mod source;

pub use elastic::ElasticsearchClient;
pub use memory::InMemorySearchBackend;
pub use pagination::{total_pages, Paginator};
pub use query::{parse_int_param, QueryBuilder, MAX_QUERY_CHARS};
pub use source::{parse_publication_date, SourceDocument};

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{SearchConfig, SearchProvider};
use crate::errors::Result;
use crate::models::{ArticleId, IndexStats, SearchHit, SearchQuery, SearchResultPage};

/// A searchable article index
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run a validated query and return one page of hits
    async fn execute(&self, query: &SearchQuery) -> Result<SearchResultPage>;

    /// Fetch one article, full text included
    async fn get_by_id(&self, id: &ArticleId) -> Result<SearchHit>;

    /// Document count and on-disk size
    async fn stats(&self) -> Result<IndexStats>;

    /// Check the backend is reachable
    async fn ping(&self) -> Result<()>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Among hits matching `id`, take the one matching on the highest-precedence
/// identifier field (DOI > PMC ID > PMID).
pub(crate) fn pick_by_precedence(hits: impl IntoIterator<Item = SearchHit>, id: &ArticleId) -> Option<SearchHit> {
    let mut hits: Vec<SearchHit> = hits.into_iter().collect();
    for kind in id.candidates() {
        if let Some(pos) = hits.iter().position(|hit| hit.ids.matches(kind, id.as_str())) {
            return Some(hits.swap_remove(pos));
        }
    }
    None
}

/// Create a search backend based on configuration
pub fn create_search_backend(config: &SearchConfig) -> Result<Arc<dyn SearchBackend>> {
    match config.provider {
        SearchProvider::Elasticsearch => {
            tracing::info!(
                host = %config.host,
                port = config.port,
                index = %config.index,
                "Using Elasticsearch search backend"
            );
            Ok(Arc::new(ElasticsearchClient::new(config)?))
        }
        SearchProvider::Memory => {
            let backend = match &config.seed_path {
                Some(path) => InMemorySearchBackend::from_json_file(path)?,
                None => {
                    tracing::warn!("In-memory search backend has no seed file, index is empty");
                    InMemorySearchBackend::new(Vec::new())
                }
            };
            Ok(Arc::new(backend))
        }
    }
}
