//! In-process search backend
//!
//! Used for local development and tests. It applies the same field weights,
//! filters and pagination as the Elasticsearch query, with substring term
//! matching in place of analysed full-text search. No highlighting.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::Instant;

use super::source::SourceDocument;
use super::{pick_by_precedence, SearchBackend};
use crate::errors::{AppError, Result};
use crate::models::{ArticleId, IndexStats, SearchFilters, SearchHit, SearchQuery, SearchResultPage};

const TIE_BREAKER: f32 = 0.3;

/// Search backend over a fixed set of articles held in memory
pub struct InMemorySearchBackend {
    articles: Vec<SearchHit>,
    available: bool,
    search_calls: AtomicUsize,
}

impl InMemorySearchBackend {
    pub fn new(articles: Vec<SearchHit>) -> Self {
        Self {
            articles,
            available: true,
            search_calls: AtomicUsize::new(0),
        }
    }

    /// A backend whose every call fails with `SearchUnavailable`
    pub fn unavailable() -> Self {
        Self {
            articles: Vec::new(),
            available: false,
            search_calls: AtomicUsize::new(0),
        }
    }

    /// Load articles from a JSON array of stored documents
    pub fn from_json_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::Configuration {
            message: format!("Failed to read seed file '{}': {}", path, e),
        })?;
        let docs: Vec<SourceDocument> = serde_json::from_str(&raw)?;

        let total = docs.len();
        let articles: Vec<SearchHit> = docs
            .into_iter()
            .filter_map(|doc| doc.into_hit(None, BTreeMap::new()))
            .collect();
        if articles.len() < total {
            tracing::warn!(
                path = path,
                skipped = total - articles.len(),
                "Seed documents without identifiers were skipped"
            );
        }

        tracing::info!(path = path, documents = articles.len(), "Loaded in-memory search index");
        Ok(Self::new(articles))
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    /// Number of `execute` calls made so far
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(AtomicOrdering::SeqCst)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(AppError::SearchUnavailable {
                message: "in-memory index is offline".to_string(),
            })
        }
    }
}

/// Best-fields score: the strongest weighted field plus a share of the rest
fn score(article: &SearchHit, terms: &[String]) -> f32 {
    let count = |text: &str| -> f32 {
        let text = text.to_lowercase();
        terms.iter().filter(|term| text.contains(term.as_str())).count() as f32
    };

    let keywords = article.keywords.iter().cloned().collect::<Vec<_>>().join(" ");
    let authors = article.authors.join(" ");
    let fields = [
        4.0 * count(&article.title),
        3.0 * article.abstract_text.as_deref().map_or(0.0, count),
        3.0 * count(&keywords),
        1.0 * article.full_text.as_deref().map_or(0.0, count),
        2.0 * count(&authors),
    ];

    let best = fields.iter().cloned().fold(0.0_f32, f32::max);
    let sum: f32 = fields.iter().sum();
    best + TIE_BREAKER * (sum - best)
}

fn passes(article: &SearchHit, filters: &SearchFilters) -> bool {
    let eq = |value: &Option<String>, wanted: &Option<String>| match wanted {
        None => true,
        Some(wanted) => value.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(wanted)),
    };

    if !eq(&article.article_type, &filters.article_type) || !eq(&article.journal, &filters.journal) {
        return false;
    }

    if let Some(author) = &filters.author {
        let author = author.to_lowercase();
        if !article.authors.iter().any(|a| a.to_lowercase().contains(&author)) {
            return false;
        }
    }

    if let Some(range) = &filters.date_range {
        match article.publication_date {
            Some(date) if range.contains(date) => {}
            _ => return false,
        }
    }

    true
}

#[async_trait]
impl SearchBackend for InMemorySearchBackend {
    async fn execute(&self, query: &SearchQuery) -> Result<SearchResultPage> {
        self.search_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.ensure_available()?;
        let start = Instant::now();

        let terms: Vec<String> = query
            .text()
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();

        let mut scored: Vec<(f32, &SearchHit)> = self
            .articles
            .iter()
            .filter(|article| passes(article, query.filters()))
            .map(|article| (score(article, &terms), article))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.canonical_id().cmp(b.canonical_id()))
        });

        let total = scored.len() as u64;
        let hits = scored
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.size() as usize)
            .map(|(score, article)| SearchHit {
                score: Some(score),
                full_text: None,
                ..article.clone()
            })
            .collect();

        Ok(SearchResultPage::new(query, hits, total, start.elapsed().as_millis() as u64))
    }

    async fn get_by_id(&self, id: &ArticleId) -> Result<SearchHit> {
        self.ensure_available()?;

        if let Some(article) = self.articles.iter().find(|a| a.canonical_id() == id.as_str()) {
            return Ok(article.clone());
        }

        pick_by_precedence(self.articles.iter().cloned(), id)
            .ok_or_else(|| AppError::ArticleNotFound { id: id.to_string() })
    }

    async fn stats(&self) -> Result<IndexStats> {
        self.ensure_available()?;
        let bytes: usize = self
            .articles
            .iter()
            .map(|a| {
                a.title.len()
                    + a.abstract_text.as_ref().map_or(0, String::len)
                    + a.full_text.as_ref().map_or(0, String::len)
            })
            .sum();
        Ok(IndexStats::new(self.articles.len() as u64, bytes as u64))
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_available()
    }

    fn name(&self) -> &str {
        "memory"
    }
}
