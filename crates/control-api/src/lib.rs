//! HTTP + WebSocket control surface (spec §4.I, §6). One `axum::Router`
//! assembled from per-route-group modules, mirroring the teacher's
//! `otap-df-admin` crate's module-per-concern layout.

pub mod auth;
pub mod detect;
pub mod distribution;
pub mod envelope;
pub mod error_mapping;
pub mod health;
pub mod pipelines;
pub mod ws;

use axum::middleware;
use axum::routing::IntoMakeService;
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use synopticon_config::{ConfigError, ServerConfig};
use synopticon_distribution::StreamSessionManager;
use synopticon_events::EventBus;
use synopticon_orchestrator::Orchestrator;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid bind configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, std::io::Error),
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Shared application state handed to every route handler. Cheap to
/// clone: every field is an `Arc` (or a small `Copy`/`Arc<Atomic*>`),
/// matching the teacher's `AdminState` pattern of one state struct built
/// once in `main` and cloned per request by axum.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<StreamSessionManager>,
    pub events: Arc<EventBus>,
    pub config: Arc<ServerConfig>,
    pub request_count: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, sessions: Arc<StreamSessionManager>, events: Arc<EventBus>, config: Arc<ServerConfig>) -> Self {
        Self { orchestrator, sessions, events, config, request_count: Arc::new(AtomicU64::new(0)) }
    }
}

async fn count_requests(
    axum::extract::State(state): axum::extract::State<AppState>,
    request: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    next.run(request).await
}

/// Builds the full router: every route group merged, request counting and
/// (when `API_KEY` is set) shared-secret auth applied uniformly.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(detect::routes())
        .merge(pipelines::routes())
        .merge(distribution::routes())
        .merge(ws::routes())
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key))
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .with_state(state)
}

/// Binds and serves the control API until `shutdown` resolves (spec §6
/// exit codes: bind failure is distinguished from any later serve error
/// so `main` can pick the right process exit code).
pub async fn serve(config: &ServerConfig, state: AppState, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> Result<(), Error> {
    let addr = config.bind_address()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| Error::Bind(addr, e))?;
    info!(%addr, "control API listening");
    let app = router(state);
    axum::serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown).await.map_err(Error::Serve)
}

/// Re-exported so `main` can type-annotate a handle if it wants to, without
/// every caller reaching into `axum` directly for this alias.
pub type MakeService = IntoMakeService<Router>;
