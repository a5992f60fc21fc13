//! Predictive Maintenance API Server
//!
//! Authenticated REST API that scores equipment telemetry with the fitted
//! failure classifier.

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::any::Any;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tower_governor::GovernorLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod rate_limit;
mod routes;

pub use crate::config::{AppConfig, LogFormat, LoggingConfig};
pub use orchestrator::{AuthScope, Orchestrator, PipelineError, Principal};

use crate::config::AuthConfig;
use crate::error::ApiError;
use credential_store::{CredentialRecord, InMemoryCredentialStore, DEMO_USERNAME};
use inference_engine::InferenceEngine;
use rate_limit::create_governor_config;
use token_service::TokenService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Login/predict pipeline
    pub orchestrator: Arc<Orchestrator>,
    /// Version string
    pub version: &'static str,
    /// Start time
    pub start_time: Instant,
    /// Prometheus exposition, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            version: env!("CARGO_PKG_VERSION"),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from this handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// Create the application router
pub fn create_router(state: AppState, config: &AppConfig) -> Result<Router> {
    let mut token_routes = Router::new().route("/token", post(routes::token::login));
    if config.rate_limit.enabled {
        let governor = create_governor_config(&config.rate_limit)
            .ok_or_else(|| anyhow!("Invalid rate limit configuration"))?;
        token_routes = token_routes.layer(GovernorLayer { config: governor });
    }

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/predict", post(routes::predict::predict))
        .merge(token_routes)
        .layer(cors_layer(&config.cors.allowed_origins)?)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin {:?}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

/// Turn a handler panic into the generic 500
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let reason = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Request handler panicked: {}", reason);
    ApiError::Internal.into_response()
}

/// Health check handler
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: state.version,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// Prometheus scrape handler
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Split `logging.file` into the directory and file name the appender wants
fn log_file_target(path: &str) -> Result<(PathBuf, PathBuf)> {
    let path = Path::new(path);
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("logging.file {:?} has no file name", path))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((directory, PathBuf::from(file_name)))
}

/// Initialize logging.
///
/// When `logging.file` is set, events are also appended to that file; keep
/// the returned guard alive until shutdown so buffered lines are flushed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log filter")?;

    let (writer, guard) = match &config.file {
        Some(path) => {
            let (directory, file_name) = log_file_target(path)?;
            std::fs::create_dir_all(&directory)
                .with_context(|| format!("Failed to create log directory {:?}", directory))?;
            let appender = tracing_appender::rolling::never(&directory, &file_name);
            let (file, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(std::io::stdout.and(file)), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(config.file.is_none())
        .with_writer(writer);
    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };

    installed.map_err(|e| anyhow!("Failed to set tracing subscriber: {}", e))?;
    Ok(guard)
}

/// Build the credential table from configuration
pub fn build_credential_store(auth: &AuthConfig) -> Result<InMemoryCredentialStore> {
    if auth.users.is_empty() {
        warn!(user = DEMO_USERNAME, "No users configured; seeding the demo account");
        return InMemoryCredentialStore::with_demo_user(auth.bcrypt_cost)
            .context("Failed to seed demo user");
    }

    let mut store = InMemoryCredentialStore::new(auth.bcrypt_cost)?;
    for user in &auth.users {
        store
            .insert(CredentialRecord {
                username: user.username.clone(),
                full_name: user.full_name.clone(),
                password_hash: user.password_hash.clone(),
            })
            .with_context(|| format!("Invalid user entry {:?}", user.username))?;
    }
    Ok(store)
}

/// Assemble the pipeline. Any missing secret or artifact is fatal.
pub fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator> {
    let secret = config.auth.signing_secret()?;
    let tokens = TokenService::new(secret.as_bytes()).context("Failed to create token service")?;

    let credentials = build_credential_store(&config.auth)?;
    info!(users = credentials.len(), "Credential store ready");

    let engine = InferenceEngine::load(&config.model.scaler_path, &config.model.model_path)
        .context("Failed to load model artifacts")?;

    Ok(Orchestrator::new(
        Arc::new(credentials),
        tokens,
        Arc::new(engine),
        config.auth.token_ttl(),
    ))
}

/// Serve `router` until Ctrl-C
pub async fn serve(listener: tokio::net::TcpListener, router: Router) -> Result<()> {
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

/// Run the server
pub async fn run_server(config: AppConfig) -> Result<()> {
    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let state = AppState::new(build_orchestrator(&config)?).with_metrics(metrics);
    let app = create_router(state, &config)?;

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Starting API server on {}", addr);
    serve(listener, app).await
}
