//! Stored article documents as they sit in the index
//!
//! Authors and journal are objects in the index mapping
//! (`{"full_name": ..}`, `{"title": .., "issn": ..}`); older documents carry
//! plain strings. Both shapes are accepted.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ArticleIds, SearchHit};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AuthorField {
    Object { full_name: String },
    Name(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum JournalField {
    Object { title: Option<String> },
    Title(String),
}

/// `_source` of an indexed article
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDocument {
    #[serde(flatten)]
    ids: ArticleIds,

    #[serde(default)]
    title: Option<String>,

    #[serde(rename = "abstract", default)]
    abstract_text: Option<String>,

    #[serde(default)]
    full_text: Option<String>,

    #[serde(default)]
    authors: Vec<AuthorField>,

    #[serde(default)]
    journal: Option<JournalField>,

    #[serde(default)]
    keywords: Vec<String>,

    #[serde(default)]
    publication_date: Option<String>,

    #[serde(default)]
    article_type: Option<String>,
}

impl SourceDocument {
    pub fn ids(&self) -> &ArticleIds {
        &self.ids
    }

    /// Map to a hit. Returns `None` when the document carries no identifier.
    pub fn into_hit(self, score: Option<f32>, highlights: BTreeMap<String, Vec<String>>) -> Option<SearchHit> {
        if self.ids.is_empty() {
            return None;
        }

        let authors = self
            .authors
            .into_iter()
            .map(|author| match author {
                AuthorField::Object { full_name } => full_name,
                AuthorField::Name(name) => name,
            })
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let journal = self
            .journal
            .and_then(|journal| match journal {
                JournalField::Object { title } => title,
                JournalField::Title(title) => Some(title),
            })
            .filter(|title| !title.trim().is_empty());

        let keywords: BTreeSet<String> = self
            .keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        Some(SearchHit {
            ids: self.ids,
            title: self.title.unwrap_or_default(),
            abstract_text: self.abstract_text.filter(|a| !a.trim().is_empty()),
            full_text: self.full_text.filter(|t| !t.trim().is_empty()),
            authors,
            journal,
            keywords,
            publication_date: self.publication_date.as_deref().and_then(parse_publication_date),
            article_type: self.article_type,
            score,
            highlights,
        })
    }
}

/// Parse full (`2020-05-17`), month (`2020-05`) or year-only (`2020`) dates
pub fn parse_publication_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("{raw}-01-01"), "%Y-%m-%d").ok())
}
