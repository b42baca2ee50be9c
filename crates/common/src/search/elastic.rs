//! Elasticsearch search client over the REST API

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::source::SourceDocument;
use super::{dsl, pick_by_precedence, SearchBackend};
use crate::config::SearchConfig;
use crate::errors::{AppError, Result};
use crate::models::{ArticleId, IndexStats, SearchHit, SearchQuery, SearchResultPage};

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    timed_out: bool,
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

/// `hits.total` is an object since ES 7 and a bare number before
#[derive(Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Object { value: u64 },
    Count(u64),
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            TotalHits::Object { value } => *value,
            TotalHits::Count(count) => *count,
        }
    }
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(rename = "_score")]
    score: Option<f32>,
    #[serde(rename = "_source")]
    source: Option<SourceDocument>,
    #[serde(default)]
    highlight: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct DocResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<SourceDocument>,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Deserialize)]
struct StatsResponse {
    #[serde(rename = "_all")]
    all: StatsSection,
}

#[derive(Deserialize)]
struct StatsSection {
    total: StoreSection,
}

#[derive(Deserialize)]
struct StoreSection {
    store: StoreStats,
}

#[derive(Deserialize)]
struct StoreStats {
    size_in_bytes: u64,
}

/// Elasticsearch client bound to one index
pub struct ElasticsearchClient {
    client: reqwest::Client,
    base_url: Url,
    index: String,
    timeout: Duration,
}

impl ElasticsearchClient {
    /// Create a client from configuration
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Self::with_base_url(&config.base_url(), &config.index, Duration::from_secs(config.timeout_secs))
    }

    /// Create a client against an explicit base URL
    pub fn with_base_url(base_url: &str, index: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| AppError::Configuration {
            message: format!("Invalid search URL '{}': {}", base_url, e),
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            index: index.to_string(),
            timeout,
        })
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// URL for `/{index}/{segments..}`; each segment is percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Configuration {
                message: format!("Search URL cannot be a base: {}", self.base_url),
            })?
            .pop_if_empty()
            .push(&self.index)
            .extend(segments);
        Ok(url)
    }

    /// Send a request under the request deadline.
    ///
    /// A reset connection is retried exactly once; every other failure is
    /// returned to the caller.
    async fn send<F>(&self, make_request: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let attempt = async {
            match make_request().send().await {
                Err(e) if is_connection_reset(&e) => {
                    tracing::warn!(error = %e, "Search connection reset, retrying once");
                    make_request().send().await
                }
                other => other,
            }
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Err(_) => Err(AppError::SearchTimeout { timeout_ms: self.timeout_ms() }),
            Ok(Err(e)) if e.is_timeout() => Err(AppError::SearchTimeout { timeout_ms: self.timeout_ms() }),
            Ok(Err(e)) => Err(AppError::SearchUnavailable {
                message: format!("Request failed: {}", e),
            }),
            Ok(Ok(response)) => Ok(response),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SearchUnavailable {
                message: format!("Search engine returned {}: {}", status, truncate_body(&body)),
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                AppError::SearchTimeout { timeout_ms: self.timeout_ms() }
            } else {
                AppError::SearchUnavailable {
                    message: format!("Malformed search response: {}", e),
                }
            }
        })
    }

    async fn fetch_doc(&self, id: &ArticleId) -> Result<Option<SearchHit>> {
        let url = self.url(&["_doc", id.as_str()])?;
        let response = self.send(|| self.client.get(url.clone())).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let doc: DocResponse = self.read_json(response).await?;
        if !doc.found {
            return Ok(None);
        }
        Ok(doc.source.and_then(|source| source.into_hit(None, BTreeMap::new())))
    }

    async fn lookup_by_fields(&self, id: &ArticleId) -> Result<Option<SearchHit>> {
        let url = self.url(&["_search"])?;
        let body = dsl::id_lookup_body(id);
        let response = self.send(|| self.client.post(url.clone()).json(&body)).await?;
        let parsed: SearchResponse = self.read_json(response).await?;

        let hits = parsed
            .hits
            .hits
            .into_iter()
            .filter_map(|raw| raw.source.and_then(|source| source.into_hit(raw.score, BTreeMap::new())));
        Ok(pick_by_precedence(hits, id))
    }
}

#[async_trait]
impl SearchBackend for ElasticsearchClient {
    async fn execute(&self, query: &SearchQuery) -> Result<SearchResultPage> {
        let start = Instant::now();
        let url = self.url(&["_search"])?;
        let body = dsl::search_body(query);

        let response = self.send(|| self.client.post(url.clone()).json(&body)).await?;
        let parsed: SearchResponse = self.read_json(response).await?;

        if parsed.timed_out {
            return Err(AppError::SearchTimeout { timeout_ms: self.timeout_ms() });
        }

        let total = parsed.hits.total.as_ref().map(TotalHits::value).unwrap_or(0);
        let mut hits = Vec::with_capacity(parsed.hits.hits.len());
        for raw in parsed.hits.hits {
            let raw_id = raw.id;
            match raw.source.and_then(|source| source.into_hit(raw.score, raw.highlight)) {
                Some(hit) => hits.push(hit),
                None => tracing::warn!(doc_id = ?raw_id, "Dropping search hit without identifiers"),
            }
        }

        tracing::debug!(
            query = %query.text(),
            page = query.page(),
            hits = hits.len(),
            total_hits = total,
            latency_ms = start.elapsed().as_millis() as u64,
            "Elasticsearch query complete"
        );

        Ok(SearchResultPage::new(query, hits, total, parsed.took))
    }

    async fn get_by_id(&self, id: &ArticleId) -> Result<SearchHit> {
        if let Some(hit) = self.fetch_doc(id).await? {
            return Ok(hit);
        }

        self.lookup_by_fields(id)
            .await?
            .ok_or_else(|| AppError::ArticleNotFound { id: id.to_string() })
    }

    async fn stats(&self) -> Result<IndexStats> {
        let count_url = self.url(&["_count"])?;
        let stats_url = self.url(&["_stats", "store"])?;

        let count: CountResponse = {
            let response = self.send(|| self.client.get(count_url.clone())).await?;
            self.read_json(response).await?
        };
        let stats: StatsResponse = {
            let response = self.send(|| self.client.get(stats_url.clone())).await?;
            self.read_json(response).await?
        };

        Ok(IndexStats::new(count.count, stats.all.total.store.size_in_bytes))
    }

    async fn ping(&self) -> Result<()> {
        let response = self.send(|| self.client.get(self.base_url.clone())).await?;
        if !response.status().is_success() {
            return Err(AppError::SearchUnavailable {
                message: format!("Search engine ping returned {}", response.status()),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "elasticsearch"
    }
}

/// Whether the error was caused by the peer resetting the connection
fn is_connection_reset(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionReset {
                return true;
            }
        }
        source = err.source();
    }
    false
}

fn truncate_body(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterSet;
    use crate::search::QueryBuilder;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::Server) -> ElasticsearchClient {
        ElasticsearchClient::with_base_url(&server.url(), "pmc_articles", Duration::from_secs(2)).unwrap()
    }

    fn query(size: i64) -> SearchQuery {
        QueryBuilder::new(50, 10_000).build("cancer", FilterSet::default(), 1, size).unwrap()
    }

    #[tokio::test]
    async fn test_execute_maps_hits() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pmc_articles/_search")
            .match_body(Matcher::PartialJson(json!({ "from": 0, "size": 2, "track_total_hits": true })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "took": 7,
                    "timed_out": false,
                    "hits": {
                        "total": { "value": 25, "relation": "eq" },
                        "hits": [
                            {
                                "_id": "10.1000/a",
                                "_score": 3.2,
                                "_source": {
                                    "doi": "10.1000/a",
                                    "title": "Cancer genomics",
                                    "authors": [{ "full_name": "Jane Doe" }],
                                    "journal": { "title": "Cell" }
                                },
                                "highlight": { "title": ["<mark>Cancer</mark> genomics"] }
                            },
                            { "_id": "doc_3", "_score": 1.0, "_source": { "title": "No ids" } }
                        ]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let page = client(&server).execute(&query(2)).await.unwrap();
        mock.assert_async().await;

        assert_eq!(page.total_hits, 25);
        assert_eq!(page.took_ms, 7);
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].canonical_id(), "10.1000/a");
        assert_eq!(page.hits[0].authors, vec!["Jane Doe"]);
        assert_eq!(page.hits[0].highlights["title"][0], "<mark>Cancer</mark> genomics");
    }

    #[tokio::test]
    async fn test_engine_timeout_flag() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/pmc_articles/_search")
            .with_status(200)
            .with_body(r#"{"took": 5000, "timed_out": true, "hits": {"total": 0, "hits": []}}"#)
            .create_async()
            .await;

        let err = client(&server).execute(&query(10)).await.unwrap_err();
        assert!(matches!(err, AppError::SearchTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/pmc_articles/_search")
            .with_status(500)
            .with_body("cluster red")
            .create_async()
            .await;

        let err = client(&server).execute(&query(10)).await.unwrap_err();
        assert!(matches!(err, AppError::SearchUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/pmc_articles/_search")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client(&server).execute(&query(10)).await.unwrap_err();
        assert!(matches!(err, AppError::SearchUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_unavailable() {
        let client = ElasticsearchClient::with_base_url("http://127.0.0.1:1", "pmc_articles", Duration::from_secs(2)).unwrap();
        let err = client.execute(&query(10)).await.unwrap_err();
        assert!(matches!(err, AppError::SearchUnavailable { .. } | AppError::SearchTimeout { .. }));
    }

    /// Read one request head off a raw connection
    async fn read_request(stream: &mut tokio::net::TcpStream) {
        use tokio::io::AsyncReadExt;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    }

    #[tokio::test]
    async fn test_connection_reset_is_retried_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut stream).await;
                if n == 0 {
                    // Zero linger turns the close into a RST
                    stream.set_linger(Some(Duration::ZERO)).unwrap();
                    drop(stream);
                } else {
                    let body = r#"{"tagline":"You Know, for Search"}"#;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    stream.write_all(response.as_bytes()).await.unwrap();
                    stream.shutdown().await.ok();
                }
            }
        });

        let client = ElasticsearchClient::with_base_url(&format!("http://{addr}"), "pmc_articles", Duration::from_secs(2)).unwrap();
        tokio_test::assert_ok!(client.ping().await);
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client = ElasticsearchClient::with_base_url(&format!("http://{addr}"), "pmc_articles", Duration::from_millis(100)).unwrap();
        let err = client.execute(&query(10)).await.unwrap_err();
        assert!(matches!(err, AppError::SearchTimeout { timeout_ms: 100 }), "{err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_get_by_id_direct_fetch_encodes_doi() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pmc_articles/_doc/10.1000%2Fxyz")
            .with_status(200)
            .with_body(
                json!({
                    "found": true,
                    "_source": { "doi": "10.1000/xyz", "title": "T", "full_text": "Body" }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let hit = client(&server)
            .get_by_id(&ArticleId::parse("10.1000/xyz").unwrap())
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(hit.full_text.as_deref(), Some("Body"));
    }

    #[tokio::test]
    async fn test_get_by_id_falls_back_to_field_lookup() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pmc_articles/_doc/PMC1234567")
            .with_status(404)
            .with_body(r#"{"found": false}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/pmc_articles/_search")
            .with_status(200)
            .with_body(
                json!({
                    "took": 1,
                    "hits": {
                        "total": { "value": 1 },
                        "hits": [{ "_id": "10.1/x", "_source": { "doi": "10.1/x", "pmcid": "PMC1234567", "title": "T" } }]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let hit = client(&server)
            .get_by_id(&ArticleId::parse("pmc1234567").unwrap())
            .await
            .unwrap();
        assert_eq!(hit.ids.pmcid.as_deref(), Some("PMC1234567"));
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pmc_articles/_doc/PMC9999999")
            .with_status(404)
            .with_body(r#"{"found": false}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/pmc_articles/_search")
            .with_status(200)
            .with_body(r#"{"took": 1, "hits": {"total": {"value": 0}, "hits": []}}"#)
            .create_async()
            .await;

        let err = client(&server)
            .get_by_id(&ArticleId::parse("PMC9999999").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ArticleNotFound { .. }));
    }

    #[tokio::test]
    async fn test_stats() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pmc_articles/_count")
            .with_status(200)
            .with_body(r#"{"count": 1200}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/pmc_articles/_stats/store")
            .with_status(200)
            .with_body(r#"{"_all": {"primaries": {"store": {"size_in_bytes": 1}}, "total": {"store": {"size_in_bytes": 2097152}}}}"#)
            .create_async()
            .await;

        let stats = client(&server).stats().await.unwrap();
        assert_eq!(stats.document_count, 1200);
        assert_eq!(stats.index_size_mb, 2.0);
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");
        assert_eq!(truncate_body(&"x".repeat(500)).len(), 200);
    }
}
