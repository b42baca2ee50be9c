//! Article records as returned by the search index

use chrono::NaiveDate;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::errors::{AppError, Result};

/// Identifier schemes for the same article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    Doi,
    Pmcid,
    Pmid,
}

impl IdKind {
    /// Lookup precedence when an identifier could match several schemes
    pub const PRECEDENCE: [IdKind; 3] = [IdKind::Doi, IdKind::Pmcid, IdKind::Pmid];

    /// Index field holding this identifier
    pub fn field(&self) -> &'static str {
        match self {
            IdKind::Doi => "doi",
            IdKind::Pmcid => "pmcid",
            IdKind::Pmid => "pmid",
        }
    }
}

/// The identifiers an article carries. At least one is present on every hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmcid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
}

impl ArticleIds {
    /// Identifier value for a scheme, ignoring blank values
    pub fn get(&self, kind: IdKind) -> Option<&str> {
        let value = match kind {
            IdKind::Doi => self.doi.as_deref(),
            IdKind::Pmcid => self.pmcid.as_deref(),
            IdKind::Pmid => self.pmid.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }

    /// Canonical lookup key: DOI, then PMC ID, then PMID
    pub fn canonical(&self) -> Option<&str> {
        IdKind::PRECEDENCE.iter().find_map(|kind| self.get(*kind))
    }

    /// Whether the identifier of the given scheme equals `value`
    pub fn matches(&self, kind: IdKind, value: &str) -> bool {
        match (kind, self.get(kind)) {
            (IdKind::Doi, Some(doi)) => doi.eq_ignore_ascii_case(value),
            (IdKind::Pmcid, Some(pmcid)) => pmcid.eq_ignore_ascii_case(value),
            (IdKind::Pmid, Some(pmid)) => pmid == value,
            (_, None) => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.canonical().is_none()
    }
}

fn doi_pattern() -> &'static Regex {
    static DOI: OnceLock<Regex> = OnceLock::new();
    DOI.get_or_init(|| Regex::new(r"^10\.\d{4,9}/\S+$").expect("DOI pattern compiles"))
}

fn pmcid_pattern() -> &'static Regex {
    static PMCID: OnceLock<Regex> = OnceLock::new();
    PMCID.get_or_init(|| Regex::new(r"(?i)^pmc\d+$").expect("PMC ID pattern compiles"))
}

fn pmid_pattern() -> &'static Regex {
    static PMID: OnceLock<Regex> = OnceLock::new();
    PMID.get_or_init(|| Regex::new(r"^\d{1,9}$").expect("PMID pattern compiles"))
}

/// A caller-supplied article identifier, classified by format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleId {
    value: String,
    kind: Option<IdKind>,
}

impl ArticleId {
    /// Parse and classify a raw identifier.
    ///
    /// PMC IDs are upper-cased (`pmc123` → `PMC123`). Identifiers matching
    /// none of the known formats are kept as-is and looked up against every
    /// scheme in precedence order.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::validation("id", "article identifier must not be empty"));
        }

        let (value, kind) = if doi_pattern().is_match(raw) {
            (raw.to_string(), Some(IdKind::Doi))
        } else if pmcid_pattern().is_match(raw) {
            (raw.to_ascii_uppercase(), Some(IdKind::Pmcid))
        } else if pmid_pattern().is_match(raw) {
            (raw.to_string(), Some(IdKind::Pmid))
        } else {
            (raw.to_string(), None)
        };

        Ok(Self { value, kind })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Detected scheme, `None` when the format is unrecognised
    pub fn kind(&self) -> Option<IdKind> {
        self.kind
    }

    /// Schemes to try, in precedence order
    pub fn candidates(&self) -> Vec<IdKind> {
        match self.kind {
            Some(kind) => vec![kind],
            None => IdKind::PRECEDENCE.to_vec(),
        }
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// A single article hit from the search index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub ids: ArticleIds,

    pub title: String,

    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,

    /// Body text; only populated for single-article lookups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,

    /// Author names in byline order
    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,

    #[serde(default)]
    pub keywords: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_type: Option<String>,

    /// Engine-assigned relevance score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,

    /// Highlighted fragments keyed by field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub highlights: BTreeMap<String, Vec<String>>,
}

impl SearchHit {
    /// Canonical identifier (DOI > PMC ID > PMID)
    pub fn canonical_id(&self) -> &str {
        self.ids.canonical().unwrap_or_default()
    }

    /// List-view projection without the full text
    pub fn summary(&self) -> ArticleSummary {
        ArticleSummary {
            id: self.canonical_id().to_string(),
            ids: self.ids.clone(),
            title: self.title.clone(),
            abstract_text: self.abstract_text.clone(),
            authors: self.authors.clone(),
            journal: self.journal.clone(),
            keywords: self.keywords.clone(),
            publication_date: self.publication_date,
            article_type: self.article_type.clone(),
            score: self.score,
            highlights: self.highlights.clone(),
        }
    }

    /// Full single-article view
    pub fn into_detail(self) -> ArticleDetail {
        ArticleDetail {
            id: self.canonical_id().to_string(),
            article: self,
        }
    }
}

/// Search result row as returned to callers (no full text)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: String,

    #[serde(flatten)]
    pub ids: ArticleIds,

    pub title: String,

    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,

    #[serde(default)]
    pub keywords: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub highlights: BTreeMap<String, Vec<String>>,
}

/// Single article with every field, including full text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDetail {
    pub id: String,

    #[serde(flatten)]
    pub article: SearchHit,
}

/// Index statistics reported by the search engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub document_count: u64,
    pub index_size_bytes: u64,
    pub index_size_mb: f64,
}

impl IndexStats {
    pub fn new(document_count: u64, index_size_bytes: u64) -> Self {
        let mb = index_size_bytes as f64 / (1024.0 * 1024.0);
        Self {
            document_count,
            index_size_bytes,
            index_size_mb: (mb * 100.0).round() / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(doi: Option<&str>, pmcid: Option<&str>, pmid: Option<&str>) -> ArticleIds {
        ArticleIds {
            doi: doi.map(String::from),
            pmcid: pmcid.map(String::from),
            pmid: pmid.map(String::from),
        }
    }

    #[test]
    fn test_canonical_id_precedence() {
        assert_eq!(ids(Some("10.1000/xyz"), Some("PMC1"), Some("1")).canonical(), Some("10.1000/xyz"));
        assert_eq!(ids(None, Some("PMC1"), Some("1")).canonical(), Some("PMC1"));
        assert_eq!(ids(Some("  "), None, Some("42")).canonical(), Some("42"));
        assert!(ids(None, None, None).is_empty());
    }

    #[test]
    fn test_parse_classifies_identifiers() {
        let doi = ArticleId::parse("10.1371/journal.pone.0123456").unwrap();
        assert_eq!(doi.kind(), Some(IdKind::Doi));

        let pmc = ArticleId::parse(" pmc1234567 ").unwrap();
        assert_eq!(pmc.kind(), Some(IdKind::Pmcid));
        assert_eq!(pmc.as_str(), "PMC1234567");

        let pmid = ArticleId::parse("31452104").unwrap();
        assert_eq!(pmid.kind(), Some(IdKind::Pmid));
        assert_eq!(pmid.candidates(), vec![IdKind::Pmid]);
    }

    #[test]
    fn test_unknown_format_tries_all_schemes_in_order() {
        let id = ArticleId::parse("doc_17").unwrap();
        assert_eq!(id.kind(), None);
        assert_eq!(id.candidates(), vec![IdKind::Doi, IdKind::Pmcid, IdKind::Pmid]);
    }

    #[test]
    fn test_blank_identifier_rejected() {
        let err = ArticleId::parse("   ").unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_summary_omits_full_text() {
        let hit = SearchHit {
            ids: ids(None, Some("PMC1234567"), None),
            title: "Tumour suppressors".into(),
            abstract_text: Some("Abstract".into()),
            full_text: Some("Very long body".into()),
            authors: vec!["A. Author".into()],
            journal: Some("Oncology".into()),
            keywords: BTreeSet::new(),
            publication_date: None,
            article_type: None,
            score: Some(1.5),
            highlights: BTreeMap::new(),
        };

        let json = serde_json::to_value(hit.summary()).unwrap();
        assert_eq!(json["id"], "PMC1234567");
        assert!(json.get("full_text").is_none());

        let detail = serde_json::to_value(hit.into_detail()).unwrap();
        assert_eq!(detail["full_text"], "Very long body");
        assert_eq!(detail["pmcid"], "PMC1234567");
    }

    #[test]
    fn test_index_stats_rounds_megabytes() {
        let stats = IndexStats::new(10, 3 * 1024 * 1024 + 512 * 1024);
        assert_eq!(stats.index_size_mb, 3.5);
    }
}
