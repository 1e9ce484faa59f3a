//! `GET /api/health` and `GET /api/config` (spec §6), plus the plain-text
//! `/healthz`/`/readyz` liveness/readiness probes the teacher's own admin
//! crate exposes alongside its richer `/status` endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use std::sync::atomic::Ordering;
use synopticon_orchestrator::OverallHealth;
use synopticon_strategy::StrategyKind;
use synopticon_types::Capability;

use crate::envelope;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(show_health))
        .route("/api/config", get(show_config))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
}

/// Process is up and able to answer at all; never reflects pipeline health.
async fn liveness() -> &'static str {
    "ok"
}

/// Reflects dispatch capacity: not-ready only when every pipeline is
/// unhealthy or breaker-open, matching `OverallHealth::Unhealthy`.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.orchestrator.get_health().await.overall {
        OverallHealth::Unhealthy => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
        OverallHealth::Healthy | OverallHealth::Degraded => (StatusCode::OK, "ready"),
    }
}

/// Best-effort resident memory in kilobytes, read from `/proc/self/status`
/// on Linux. Returns `None` off-Linux or if the file can't be read —
/// spec §6 asks for "memory" in the health payload but doesn't mandate a
/// platform-independent source for it.
fn resident_memory_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse().ok())
}

async fn show_health(State(state): State<AppState>) -> Response {
    let health = state.orchestrator.get_health().await;
    envelope::ok(json!({
        "pipelines": health.pipelines,
        "overall": health.overall,
        "requests_handled": state.request_count.load(Ordering::Relaxed),
        "memory_kb": resident_memory_kb(),
    }))
}

async fn show_config(State(_state): State<AppState>) -> Response {
    envelope::ok(json!({
        "capabilities": Capability::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
        "strategies": StrategyKind::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        "features": {
            "distribution_transports": ["udp", "mqtt", "websocket", "http", "sse"],
            "quality_control": true,
            "recording": true,
        },
        "limits": {
            "max_fallbacks_default": 2,
            "ws_rate_limit_per_second": crate::ws::WS_RATE_LIMIT_PER_SECOND,
            "ws_max_message_bytes": crate::ws::WS_MAX_MESSAGE_BYTES,
            "udp_max_datagram_bytes": 1400,
        },
    }))
}
