//! Metrics and observability utilities
//!
//! Prometheus metrics for the request path: HTTP requests, search queries,
//! generation calls and prompt context assembly.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Organa metrics
pub const METRICS_PREFIX: &str = "organa";

/// Histogram buckets for request and search latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for generation latency (small local models take seconds)
pub const GENERATION_BUCKETS: &[f64] = &[
    0.250,
    0.500,
    1.000,
    2.500,
    5.000,
    10.00,
    20.00,
    30.00,
    60.00,
    120.0,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Search metrics
    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search query latency in seconds"
    );

    describe_histogram!(
        format!("{}_search_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of hits returned per search page"
    );

    // Generation metrics
    describe_counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total inference service generation requests"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Generation latency in seconds"
    );

    describe_counter!(
        format!("{}_generation_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total generation failures"
    );

    // Context metrics
    describe_histogram!(
        format!("{}_context_documents", METRICS_PREFIX),
        Unit::Count,
        "Documents included in a prompt context"
    );

    describe_histogram!(
        format!("{}_context_chars", METRICS_PREFIX),
        Unit::Count,
        "Characters used by a prompt context"
    );

    describe_counter!(
        format!("{}_context_truncations_total", METRICS_PREFIX),
        Unit::Count,
        "Prompt contexts that cut a document short"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one search call. `outcome` is `ok` or an error code.
pub fn record_search(duration_secs: f64, backend: &str, outcome: &str, result_count: usize) {
    counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        "backend" => backend.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        "backend" => backend.to_string()
    )
    .record(duration_secs);

    histogram!(
        format!("{}_search_results_count", METRICS_PREFIX),
        "backend" => backend.to_string()
    )
    .record(result_count as f64);
}

/// Record one generation call
pub fn record_generation(duration_secs: f64, model: &str, status: &str, success: bool) {
    counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_generation_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_generation_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Record the shape of an assembled prompt context
pub fn record_context(documents: usize, chars: usize, truncated: bool) {
    histogram!(format!("{}_context_documents", METRICS_PREFIX)).record(documents as f64);
    histogram!(format!("{}_context_chars", METRICS_PREFIX)).record(chars as f64);
    if truncated {
        counter!(format!("{}_context_truncations_total", METRICS_PREFIX)).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, GENERATION_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
        // generation timeout default is 60s
        assert!(GENERATION_BUCKETS.contains(&60.0));
    }

    #[test]
    fn test_recorders_without_exporter() {
        let metrics = RequestMetrics::start("GET", "/articles/search");
        metrics.finish(200);
        record_search(0.01, "memory", "ok", 10);
        record_generation(1.2, "qwen:0.5b", "complete", true);
        record_context(3, 1200, false);
        // Just verify it runs without panic
    }
}
