//! Organa API Gateway
//!
//! HTTP entry point for article search and grounded generation.
//! Handles:
//! - Rate limiting and backpressure
//! - Request routing
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    extract::Request,
    middleware::Next,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use organa_common::{
    config::{AppConfig, ObservabilityConfig},
    metrics::{self, GENERATION_BUCKETS, LATENCY_BUCKETS, METRICS_PREFIX},
    Orchestrator,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::{limit::ConcurrencyLimitLayer, ServiceBuilder};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::middleware::{rate_limit, request_metrics};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub metrics: Option<PrometheusHandle>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config.observability);
    info!("Starting Organa API Gateway v{}", organa_common::VERSION);

    // Initialize metrics
    let metrics_handle = if config.observability.metrics_enabled {
        Some(install_metrics_recorder()?)
    } else {
        None
    };
    metrics::register_metrics();

    let orchestrator = Orchestrator::from_config(&config).map_err(|e| {
        tracing::error!(error = %e, "Failed to initialise backends");
        e
    })?;

    let state = AppState {
        config: config.clone(),
        orchestrator: Arc::new(orchestrator),
        metrics: metrics_handle,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level when set
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_generation_duration_seconds", METRICS_PREFIX)),
            GENERATION_BUCKETS,
        )?
        .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), LATENCY_BUCKETS)?
        .install_recorder()?;
    Ok(handle)
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Article endpoints
        .route("/articles/search", get(handlers::articles::search))
        .route("/articles/{id}", get(handlers::articles::get_article))
        .route("/articles/{id}/similar", get(handlers::articles::similar))
        .route("/stats", get(handlers::articles::stats))

        // LLM endpoints
        .route("/llm/models", get(handlers::llm::models))
        .route("/llm/generate", post(handlers::llm::generate))
        .route("/llm/summarize", post(handlers::llm::summarize))
        .route("/llm/analyze", post(handlers::llm::analyze))
        .route("/llm/answer", post(handlers::llm::answer));

    // Probes are never rate limited
    let api_routes = if state.config.rate_limit.enabled {
        let limit = state.config.rate_limit.requests_per_second;
        let limiter = rate_limit::create_rate_limiter(limit, state.config.rate_limit.burst);
        api_routes.layer(axum::middleware::from_fn(move |request: Request, next: Next| {
            rate_limit::rate_limit_middleware(request, next, limiter.clone(), limit)
        }))
    } else {
        api_routes
    };

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        .merge(api_routes)
        .route_layer(axum::middleware::from_fn(request_metrics::track_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(request_id)
                .layer(propagate_id)
                .layer(cors)
                .layer(tower_http::map_response_body::MapResponseBodyLayer::new(
                    axum::body::Body::new,
                ))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                // Concurrency limit for backpressure
                .layer(ConcurrencyLimitLayer::new(state.config.server.max_concurrent_requests)),
        )
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
