//! `GET /api/pipelines`, `GET /api/strategies`, and the test-only hot
//! registration endpoint (spec §6, §8 scenario 1).

use axum::extract::State;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use synopticon_pipeline::testing::ScriptedModule;
use synopticon_pipeline::{Pipeline, PipelineHandle};
use synopticon_strategy::StrategyKind;
use synopticon_types::{Capability, Impact, PerformanceProfile, PipelineDescriptor};

use crate::envelope;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/pipelines", get(list_pipelines))
        .route("/api/pipelines/register", post(register_pipeline))
        .route("/api/strategies", get(list_strategies))
}

async fn list_pipelines(State(state): State<AppState>) -> Response {
    envelope::ok(state.orchestrator.list_descriptors())
}

async fn list_strategies(State(_state): State<AppState>) -> Response {
    envelope::ok(StrategyKind::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>())
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: String,
    capabilities: Vec<String>,
    #[serde(default)]
    fail_times: usize,
    #[serde(default = "default_fps")]
    fps: u32,
}

fn default_fps() -> u32 {
    30
}

/// Hot-registers a deterministic scripted test pipeline (spec §8 scenario
/// 1's "register a new pipeline at runtime without a restart"). This is a
/// development/testing seam, not a way to load real CV/ML models — those
/// are wired up in `main` at startup, same as the teacher's receivers and
/// exporters.
async fn register_pipeline(State(state): State<AppState>, Json(body): Json<RegisterRequest>) -> Response {
    let mut capabilities = BTreeSet::new();
    for tag in &body.capabilities {
        match Capability::parse(tag) {
            Ok(capability) => {
                let _ = capabilities.insert(capability);
            }
            Err(err) => return envelope::error(axum::http::StatusCode::BAD_REQUEST, "input_validation", err.to_string()),
        }
    }
    let descriptor = PipelineDescriptor::new(
        body.name.clone(),
        "test",
        capabilities,
        PerformanceProfile { fps: body.fps, latency_ms: 10, cpu: Impact::Low, memory: Impact::Low, battery: Impact::Low, model_size_mb: 0.0 },
    );
    let pipeline = std::sync::Arc::new(Pipeline::new(descriptor, ScriptedModule::new(body.fail_times)));
    if let Err(err) = pipeline.initialize(Value::Null).await {
        return envelope::error(axum::http::StatusCode::INTERNAL_SERVER_ERROR, "initialization", err.message);
    }
    match state.orchestrator.register(pipeline).await {
        Ok(()) => envelope::ok(json!({"registered": body.name})),
        Err(err) => envelope::error(axum::http::StatusCode::CONFLICT, "input_validation", err.to_string()),
    }
}
