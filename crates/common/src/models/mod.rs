//! Domain models shared by the search, context and generation layers
//!
//! All values are created per request and dropped with the response.

mod article;
mod page;
mod query;

pub use article::{ArticleDetail, ArticleId, ArticleIds, ArticleSummary, IdKind, IndexStats, SearchHit};
pub use page::{ResponseEnvelope, SearchResultPage};
pub use query::{DateRange, FilterSet, SearchFilters, SearchQuery};
