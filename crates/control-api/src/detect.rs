//! `POST /api/detect` and `POST /api/batch` (spec §6).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use synopticon_orchestrator::ProcessRequest;
use synopticon_pipeline::Frame;
use synopticon_strategy::StrategyKind;
use synopticon_types::{now_ms, AnalysisResult, Capability, CapabilitySet, ErrorKind, ErrorRecord};

use crate::envelope;
use crate::error_mapping::status_for;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/detect", post(detect)).route("/api/batch", post(batch))
}

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    pub image: Value,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Targets one named pipeline directly, bypassing capability-based
    /// candidate selection (spec §4.J: the media streaming producer has no
    /// analysis capability of its own to be dispatched by).
    #[serde(default)]
    pub pipeline: Option<String>,
}

fn parse_strategy(raw: &str) -> Option<StrategyKind> {
    StrategyKind::ALL.iter().copied().find(|s| s.as_str() == raw)
}

fn parse_capabilities(raw: &[String]) -> Result<CapabilitySet, String> {
    let mut set: CapabilitySet = BTreeSet::new();
    for tag in raw {
        let capability = Capability::parse(tag).map_err(|e| e.to_string())?;
        let _ = set.insert(capability);
    }
    Ok(set)
}

/// Builds a dispatch request out of one detect-shaped JSON body, or an
/// already-failed `AnalysisResult` if the request itself is malformed
/// (unknown capability/strategy — spec §7 `input_validation`, never
/// reaches the orchestrator or its circuit breakers).
fn build_request(body: DetectRequest) -> Result<ProcessRequest, AnalysisResult> {
    let ts = now_ms();
    if body.pipeline.is_none() && body.capabilities.is_empty() {
        return Err(AnalysisResult::make_failure(
            ErrorRecord::new(ErrorKind::InputValidation, "capabilities must be non-empty", "control-api", ts),
            ts,
        ));
    }
    let capabilities = parse_capabilities(&body.capabilities).map_err(|message| {
        AnalysisResult::make_failure(ErrorRecord::new(ErrorKind::InputValidation, message, "control-api", ts), ts)
    })?;
    let strategy = match body.strategy.as_deref() {
        None => None,
        Some(raw) => match parse_strategy(raw) {
            Some(kind) => Some(kind),
            None => {
                return Err(AnalysisResult::make_failure(
                    ErrorRecord::new(ErrorKind::InputValidation, format!("unknown strategy {raw:?}"), "control-api", ts),
                    ts,
                ))
            }
        },
    };
    let image_bytes = serde_json::to_vec(&body.image).unwrap_or_default();
    let frame = Frame::new("api", ts, image_bytes, capabilities.clone());
    let mut request = match body.pipeline {
        Some(name) => ProcessRequest::to_pipeline(name, frame),
        None => ProcessRequest::new(capabilities, frame),
    };
    request.strategy = strategy;
    request.timeout = body.timeout_ms.map(Duration::from_millis);
    Ok(request)
}

/// Converts one `AnalysisResult` into the uniform envelope + HTTP status
/// (spec §7: success is always 200; a domain failure's HTTP status comes
/// from its `ErrorKind`).
pub fn result_response(result: AnalysisResult) -> Response {
    match &result {
        AnalysisResult::Success { .. } => envelope::ok(result),
        AnalysisResult::Failure { error, .. } => {
            envelope::error(status_for(error.kind), &error.kind.to_string(), error.message.clone())
        }
    }
}

async fn detect(State(state): State<AppState>, Json(body): Json<DetectRequest>) -> Response {
    match build_request(body) {
        Ok(request) => result_response(state.orchestrator.process(request).await),
        Err(failure) => result_response(failure),
    }
}

async fn batch(State(state): State<AppState>, Json(bodies): Json<Vec<DetectRequest>>) -> Response {
    if bodies.is_empty() {
        return envelope::error(StatusCode::BAD_REQUEST, "input_validation", "batch body must not be empty");
    }
    let mut results = Vec::with_capacity(bodies.len());
    for body in bodies {
        let result = match build_request(body) {
            Ok(request) => state.orchestrator.process(request).await,
            Err(failure) => failure,
        };
        results.push(result);
    }
    envelope::ok(serde_json::json!({"results": results}))
}
