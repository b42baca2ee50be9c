//! Configuration management for Organa services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - The deployment variables `ELASTICSEARCH_HOST`, `ELASTICSEARCH_PORT`,
//!   `ELASTICSEARCH_INDEX` and `OLLAMA_API_URL`
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Search index configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Inference service configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Prompt context configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

/// Which search backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchProvider {
    Elasticsearch,
    /// In-process index, for development and tests
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: SearchProvider,

    /// http or https
    #[serde(default = "default_search_scheme")]
    pub scheme: String,

    #[serde(default = "default_search_host")]
    pub host: String,

    #[serde(default = "default_search_port")]
    pub port: u16,

    /// Index holding PMC articles
    #[serde(default = "default_search_index")]
    pub index: String,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Deepest hit (offset + size) the engine will serve
    #[serde(default = "default_max_result_window")]
    pub max_result_window: u64,

    /// JSON file of articles to preload into the memory provider
    pub seed_path: Option<String>,
}

/// Which inference backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Ollama,
    /// Canned responses, for development and tests
    Mock,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: LlmProvider,

    /// API base URL, including the `/api` prefix
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model used when a request names none
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Generation timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    /// Maximum characters of retrieved text admitted into a prompt
    #[serde(default = "default_budget_chars")]
    pub budget_chars: usize,

    /// Hits fed into the answer flow
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Include full text (not just abstracts) in context
    #[serde(default)]
    pub deep_context: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Expose Prometheus metrics on /metrics
    #[serde(default = "default_enabled")]
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_max_concurrent() -> usize { 100 }
fn default_search_provider() -> SearchProvider { SearchProvider::Elasticsearch }
fn default_search_scheme() -> String { "http".to_string() }
fn default_search_host() -> String { "localhost".to_string() }
fn default_search_port() -> u16 { 9200 }
fn default_search_index() -> String { "pmc_articles".to_string() }
fn default_search_timeout() -> u64 { 10 }
fn default_page_size() -> u32 { 10 }
fn default_max_page_size() -> u32 { 50 }
fn default_max_result_window() -> u64 { 10_000 }
fn default_llm_provider() -> LlmProvider { LlmProvider::Ollama }
fn default_llm_base_url() -> String { "http://localhost:11434/api".to_string() }
fn default_model() -> String { crate::DEFAULT_MODEL.to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_max_tokens() -> u32 { 500 }
fn default_temperature() -> f32 { 0.7 }
fn default_budget_chars() -> usize { 6000 }
fn default_top_k() -> u32 { 5 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SEARCH__INDEX=pmc_articles
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            // Deployment variables win over everything else
            .set_override_option("search.host", std::env::var("ELASTICSEARCH_HOST").ok())?
            .set_override_option("search.port", std::env::var("ELASTICSEARCH_PORT").ok())?
            .set_override_option("search.index", std::env::var("ELASTICSEARCH_INDEX").ok())?
            .set_override_option("llm.base_url", std::env::var("OLLAMA_API_URL").ok())?

            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no request could ever satisfy
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.max_page_size == 0 {
            return Err(ConfigError::Message("search.max_page_size must be at least 1".into()));
        }
        if self.search.default_page_size == 0 || self.search.default_page_size > self.search.max_page_size {
            return Err(ConfigError::Message(format!(
                "search.default_page_size must be within 1..={}",
                self.search.max_page_size
            )));
        }
        if self.context.top_k == 0 || self.context.top_k > self.search.max_page_size {
            return Err(ConfigError::Message(format!(
                "context.top_k must be within 1..={}",
                self.search.max_page_size
            )));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl SearchConfig {
    /// Base URL of the search engine
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            scheme: default_search_scheme(),
            host: default_search_host(),
            port: default_search_port(),
            index: default_search_index(),
            timeout_secs: default_search_timeout(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_result_window: default_max_result_window(),
            seed_path: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_llm_base_url(),
            default_model: default_model(),
            timeout_secs: default_llm_timeout(),
            default_max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget_chars: default_budget_chars(),
            top_k: default_top_k(),
            deep_context: false,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_enabled: default_enabled(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            search: SearchConfig::default(),
            llm: LlmConfig::default(),
            context: ContextConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.search.index, "pmc_articles");
        assert_eq!(config.search.default_page_size, 10);
        assert_eq!(config.llm.default_model, "qwen:0.5b");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_search_base_url() {
        let config = AppConfig::default();
        assert_eq!(config.search.base_url(), "http://localhost:9200");

        let mut search = SearchConfig::default();
        search.scheme = "https".into();
        search.host = "es.internal".into();
        search.port = 9243;
        assert_eq!(search.base_url(), "https://es.internal:9243");
    }

    #[test]
    fn test_validate_rejects_oversized_default_page() {
        let mut config = AppConfig::default();
        config.search.default_page_size = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_top_k_beyond_page_limit() {
        let mut config = AppConfig::default();
        config.context.top_k = 0;
        assert!(config.validate().is_err());
    }
}
