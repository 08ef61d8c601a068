use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use sqlgate_core::{SqlGenerator, ValueFormatter};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::forwarding::{ForwardingOrchestrator, ForwardingTables, RetryPolicy};
use crate::{handlers, middleware as app_middleware};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<SqlGenerator>,
    pub orchestrator: Arc<ForwardingOrchestrator>,
    pub retry: RetryPolicy,
    pub forwarding_enabled: bool,
}

impl AppState {
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let formatter = ValueFormatter::with_date_tokens(&cfg.generation.date_tokens);
        let tables = ForwardingTables::from_config(&cfg.forwarding.tables())
            .context("invalid forwarding configuration")?;
        let orchestrator = ForwardingOrchestrator::new(tables, &cfg.forwarding)
            .context("failed to build HTTP client")?;
        Ok(Self {
            generator: Arc::new(SqlGenerator::with_formatter(formatter)),
            orchestrator: Arc::new(orchestrator),
            retry: RetryPolicy::from_config(&cfg.forwarding.retry),
            forwarding_enabled: cfg.forwarding.enabled,
        })
    }
}

pub struct SqlGateServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(cfg)?;
    Ok(build_router(state, cfg.server.body_limit_bytes))
}

pub fn build_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/api/generate", post(handlers::generate))
        .route("/api/ddl", post(handlers::ddl))
        .route(
            "/api/forwarding/routes",
            get(handlers::list_routes).put(handlers::replace_routes),
        )
        .fallback(handlers::forward_any)
        .with_state(state)
        // Middleware stack (innermost first: body limit -> trace -> compression/cors -> request id)
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status().as_u16();
                        span.record("http.status_code", tracing::field::display(status));
                        tracing::info!(
                            http.status = %status,
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(app_middleware::request_id))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> anyhow::Result<SqlGateServer> {
        let app = build_app(&self.config)?;
        Ok(SqlGateServer {
            addr: self.addr,
            app,
        })
    }
}

impl SqlGateServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
