//! Shapes result pages into the response envelope

use crate::models::{ResponseEnvelope, SearchResultPage};

/// Number of pages needed for `total_hits`; 0 when nothing matched
pub fn total_pages(total_hits: u64, size: u32) -> u64 {
    if total_hits == 0 || size == 0 {
        return 0;
    }
    total_hits.div_ceil(u64::from(size))
}

pub struct Paginator;

impl Paginator {
    /// Format a page. Pure: formatting the same page twice gives equal envelopes.
    pub fn format(page: &SearchResultPage) -> ResponseEnvelope {
        let total_pages = total_pages(page.total_hits, page.size);
        ResponseEnvelope {
            query: page.query.clone(),
            total_hits: page.total_hits,
            page: page.page,
            size: page.size,
            total_pages,
            has_next: u64::from(page.page) < total_pages,
            took_ms: page.took_ms,
            results: page.hits.iter().map(|hit| hit.summary()).collect(),
        }
    }
}
