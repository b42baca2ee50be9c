//! Organa Common Library
//!
//! Retrieval-augmented question answering over a PubMed Central index:
//! - Search query construction and the search backends
//! - Prompt context assembly under a character budget
//! - Inference service clients with model validation
//! - Orchestration of search → context → generation flows
//! - Error types, configuration and metrics shared with the gateway

pub mod config;
pub mod context;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod search;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use orchestrator::Orchestrator;
pub use search::SearchBackend;
pub use llm::InferenceBackend;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Model used when a request names none
pub const DEFAULT_MODEL: &str = "qwen:0.5b";
