//! Elasticsearch request bodies
//!
//! Pure functions from validated queries to query DSL. Kept apart from the
//! HTTP client so the generated JSON can be asserted on directly.

use serde_json::{json, Value};

use crate::models::{ArticleId, SearchFilters, SearchQuery};

/// Weighted fields searched by the free-text clause
pub const SEARCH_FIELDS: [&str; 6] = [
    "title^4",
    "abstract^3",
    "keywords^3",
    "sections.*^2",
    "full_text^1",
    "authors.full_name^2",
];

const TIE_BREAKER: f64 = 0.3;

/// Body for `POST /{index}/_search`
pub fn search_body(query: &SearchQuery) -> Value {
    let mut bool_query = json!({
        "must": [{
            "multi_match": {
                "query": query.text(),
                "fields": SEARCH_FIELDS,
                "type": "best_fields",
                "tie_breaker": TIE_BREAKER
            }
        }]
    });

    let filters = filter_clauses(query.filters());
    if !filters.is_empty() {
        bool_query["filter"] = Value::Array(filters);
    }

    json!({
        "query": { "bool": bool_query },
        "highlight": {
            "fields": {
                "title": { "number_of_fragments": 0 },
                "abstract": { "fragment_size": 150, "number_of_fragments": 2 },
                "sections.*": { "fragment_size": 150, "number_of_fragments": 1 }
            },
            "pre_tags": ["<mark>"],
            "post_tags": ["</mark>"]
        },
        "_source": { "excludes": ["full_text"] },
        "track_total_hits": true,
        "from": query.offset(),
        "size": query.size()
    })
}

fn filter_clauses(filters: &SearchFilters) -> Vec<Value> {
    let mut clauses = Vec::new();

    if let Some(article_type) = &filters.article_type {
        clauses.push(json!({
            "term": { "article_type": { "value": article_type, "case_insensitive": true } }
        }));
    }

    if let Some(journal) = &filters.journal {
        clauses.push(json!({
            "term": { "journal.title.keyword": { "value": journal, "case_insensitive": true } }
        }));
    }

    if let Some(author) = &filters.author {
        clauses.push(json!({
            "nested": {
                "path": "authors",
                "query": { "match": { "authors.full_name": author } }
            }
        }));
    }

    if let Some(range) = &filters.date_range {
        let mut bounds = serde_json::Map::new();
        if let Some(from) = range.from {
            bounds.insert("gte".into(), json!(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = range.to {
            bounds.insert("lte".into(), json!(to.format("%Y-%m-%d").to_string()));
        }
        clauses.push(json!({ "range": { "publication_date": bounds } }));
    }

    clauses
}

/// Body for the identifier fallback lookup: any candidate field equal to the id
pub fn id_lookup_body(id: &ArticleId) -> Value {
    let should: Vec<Value> = id
        .candidates()
        .iter()
        .map(|kind| {
            json!({
                "term": { kind.field(): { "value": id.as_str(), "case_insensitive": true } }
            })
        })
        .collect();

    json!({
        "query": { "bool": { "should": should, "minimum_should_match": 1 } },
        "size": 10
    })
}

/// Free text for a similar-articles search: the title followed by the keywords
pub fn similar_text(title: &str, keywords: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    let mut text = title.trim().to_string();
    for keyword in keywords {
        let keyword = keyword.as_ref().trim();
        if !keyword.is_empty() {
            text.push(' ');
            text.push_str(keyword);
        }
    }
    text
}
