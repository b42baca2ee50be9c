//! Search query types
//!
//! `FilterSet` carries the loosely-typed filter strings a caller sends;
//! `SearchQuery` is the validated, strongly-typed form produced by
//! [`crate::search::QueryBuilder`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw, unvalidated filters as received from a caller
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterSet {
    pub article_type: Option<String>,
    pub journal: Option<String>,
    pub author: Option<String>,
    /// `YYYY-MM-DD`
    pub date_from: Option<String>,
    /// `YYYY-MM-DD`
    pub date_to: Option<String>,
}

/// Inclusive publication date bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Validated filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchFilters {
    /// Lower-cased, matched case-insensitively
    pub article_type: Option<String>,
    /// Matched case-insensitively against the exact journal title
    pub journal: Option<String>,
    /// Free-text match on author names
    pub author: Option<String>,
    pub date_range: Option<DateRange>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.article_type.is_none()
            && self.journal.is_none()
            && self.author.is_none()
            && self.date_range.is_none()
    }
}

/// A validated search request. Only the query builder constructs these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub(crate) text: String,
    pub(crate) page: u32,
    pub(crate) size: u32,
    pub(crate) filters: SearchFilters,
}

impl SearchQuery {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 1-based page number
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn filters(&self) -> &SearchFilters {
        &self.filters
    }

    /// Number of hits to skip
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }
}
