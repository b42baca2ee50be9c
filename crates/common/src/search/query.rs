//! Query construction and validation
//!
//! Turns caller input (free text, loosely-typed filters and paging numbers)
//! into a [`SearchQuery`]. Nothing here touches the network.

use chrono::NaiveDate;

use crate::config::SearchConfig;
use crate::errors::{AppError, Result};
use crate::models::{DateRange, FilterSet, SearchFilters, SearchQuery};

/// Longest accepted query text, in characters
pub const MAX_QUERY_CHARS: usize = 1000;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Builds validated search queries
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    max_page_size: u32,
    max_result_window: u64,
}

impl QueryBuilder {
    pub fn new(max_page_size: u32, max_result_window: u64) -> Self {
        Self {
            max_page_size,
            max_result_window,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.max_page_size, config.max_result_window)
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    /// Validate raw input and build a query.
    ///
    /// Blank filter values count as absent. `article_type` is lower-cased;
    /// `journal` and `author` are only trimmed.
    pub fn build(&self, raw_query: &str, filters: FilterSet, page: i64, size: i64) -> Result<SearchQuery> {
        let text = raw_query.trim();
        if text.is_empty() {
            return Err(AppError::validation("query", "query must not be empty"));
        }
        if text.chars().count() > MAX_QUERY_CHARS {
            return Err(AppError::validation(
                "query",
                format!("query must be at most {} characters", MAX_QUERY_CHARS),
            ));
        }

        if page < 1 {
            return Err(AppError::validation("page", "page must be at least 1"));
        }
        if size < 1 || size > i64::from(self.max_page_size) {
            return Err(AppError::validation(
                "size",
                format!("size must be between 1 and {}", self.max_page_size),
            ));
        }
        let page = u32::try_from(page)
            .map_err(|_| AppError::validation("page", "page is too large"))?;
        let size = size as u32;

        let window = u64::from(page - 1)
            .saturating_mul(u64::from(size))
            .saturating_add(u64::from(size));
        if window > self.max_result_window {
            return Err(AppError::validation(
                "page",
                format!(
                    "page {} of size {} exceeds the result window of {} hits",
                    page, size, self.max_result_window
                ),
            ));
        }

        let date_from = parse_date("date_from", filters.date_from.as_deref())?;
        let date_to = parse_date("date_to", filters.date_to.as_deref())?;
        if let (Some(from), Some(to)) = (date_from, date_to) {
            if from > to {
                return Err(AppError::validation("date_from", "date_from must not be after date_to"));
            }
        }
        let date_range = (date_from.is_some() || date_to.is_some()).then_some(DateRange {
            from: date_from,
            to: date_to,
        });

        Ok(SearchQuery {
            text: text.to_string(),
            page,
            size,
            filters: SearchFilters {
                article_type: non_blank(filters.article_type.as_deref()).map(|t| t.to_lowercase()),
                journal: non_blank(filters.journal.as_deref()).map(str::to_string),
                author: non_blank(filters.author.as_deref()).map(str::to_string),
                date_range,
            },
        })
    }
}

/// Parse an optional integer request parameter, falling back to `default`
/// when it is missing or blank.
pub fn parse_int_param(field: &str, raw: Option<&str>, default: i64) -> Result<i64> {
    match non_blank(raw) {
        None => Ok(default),
        Some(value) => value
            .parse::<i64>()
            .map_err(|_| AppError::validation(field, format!("{} must be an integer, got '{}'", field, value))),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>> {
    non_blank(raw)
        .map(|value| {
            NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
                AppError::validation(field, format!("{} must be a date in YYYY-MM-DD format", field))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> QueryBuilder {
        QueryBuilder::new(50, 10_000)
    }

    fn field_of(err: AppError) -> Option<String> {
        match err {
            AppError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_build_trims_query() {
        let query = builder().build("  breast cancer ", FilterSet::default(), 1, 10).unwrap();
        assert_eq!(query.text(), "breast cancer");
        assert_eq!(query.page(), 1);
        assert_eq!(query.size(), 10);
        assert!(query.filters().is_empty());
    }

    #[test]
    fn test_empty_query_rejected() {
        let err = builder().build("   ", FilterSet::default(), 1, 10).unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("query"));
    }

    #[test]
    fn test_overlong_query_rejected() {
        let text = "a".repeat(MAX_QUERY_CHARS + 1);
        assert!(builder().build(&text, FilterSet::default(), 1, 10).is_err());
        let text = "a".repeat(MAX_QUERY_CHARS);
        assert!(builder().build(&text, FilterSet::default(), 1, 10).is_ok());
    }

    #[test]
    fn test_page_and_size_bounds() {
        let b = builder();
        assert_eq!(field_of(b.build("q", FilterSet::default(), 0, 10).unwrap_err()).as_deref(), Some("page"));
        assert_eq!(field_of(b.build("q", FilterSet::default(), -3, 10).unwrap_err()).as_deref(), Some("page"));
        assert_eq!(field_of(b.build("q", FilterSet::default(), 1, 0).unwrap_err()).as_deref(), Some("size"));
        assert_eq!(field_of(b.build("q", FilterSet::default(), 1, 51).unwrap_err()).as_deref(), Some("size"));
        assert!(b.build("q", FilterSet::default(), 1, 50).is_ok());
    }

    #[test]
    fn test_result_window_enforced() {
        let b = builder();
        assert!(b.build("q", FilterSet::default(), 1000, 10).is_ok());
        assert!(b.build("q", FilterSet::default(), 1001, 10).is_err());
    }

    #[test]
    fn test_filters_normalised() {
        let filters = FilterSet {
            article_type: Some(" Research-Article ".into()),
            journal: Some("  Nature Medicine".into()),
            author: Some("".into()),
            date_from: Some("2020-01-01".into()),
            date_to: Some(" ".into()),
        };
        let query = builder().build("q", filters, 1, 10).unwrap();
        let f = query.filters();
        assert_eq!(f.article_type.as_deref(), Some("research-article"));
        assert_eq!(f.journal.as_deref(), Some("Nature Medicine"));
        assert_eq!(f.author, None);
        let range = f.date_range.unwrap();
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(range.to, None);
    }

    #[test]
    fn test_bad_dates_rejected() {
        let filters = FilterSet {
            date_from: Some("01/02/2020".into()),
            ..Default::default()
        };
        assert_eq!(field_of(builder().build("q", filters, 1, 10).unwrap_err()).as_deref(), Some("date_from"));

        let filters = FilterSet {
            date_from: Some("2021-01-01".into()),
            date_to: Some("2020-01-01".into()),
            ..Default::default()
        };
        assert!(builder().build("q", filters, 1, 10).is_err());
    }

    #[test]
    fn test_parse_int_param() {
        assert_eq!(parse_int_param("page", None, 1).unwrap(), 1);
        assert_eq!(parse_int_param("page", Some(" "), 1).unwrap(), 1);
        assert_eq!(parse_int_param("size", Some("25"), 10).unwrap(), 25);
        assert!(parse_int_param("size", Some("ten"), 10).is_err());
    }
}
