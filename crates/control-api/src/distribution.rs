//! `/api/distribution/*` (spec §6): stream lifecycle, status, discovery,
//! and templates. The WebSocket event channel lives in `ws.rs`.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use synopticon_distribution::StreamListFilter;
use synopticon_types::{Capability, DestinationSpec, FilterSpec, StreamPatch, StreamSpec, StreamStatus, TransportKind};
use uuid::Uuid;

use crate::envelope;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/distribution/status", get(status))
        .route("/api/distribution/discovery", get(discovery))
        .route("/api/distribution/templates", get(templates))
        .route("/api/distribution/streams", post(create_stream).get(list_streams))
        .route("/api/distribution/streams/{id}", get(get_stream).put(modify_stream).delete(remove_stream))
        .route("/api/distribution/streams/{id}/record", post(record_stream))
        .route("/api/distribution/streams/{id}/share", post(share_stream))
}

async fn status(State(state): State<AppState>) -> Response {
    envelope::ok(state.sessions.status().await)
}

async fn discovery(State(state): State<AppState>) -> Response {
    envelope::ok(json!({
        "sources": Capability::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
        "distributors": ["udp", "mqtt", "websocket", "http", "sse"],
        "templates": template_list(),
        "clients": state.sessions.list(StreamListFilter::default()).await.len(),
    }))
}

/// Named `StreamSpec` presets (spec §6 `GET /api/distribution/templates`):
/// common destinations callers can start from rather than hand-assembling
/// one from scratch.
fn template_list() -> Vec<serde_json::Value> {
    vec![
        json!({
            "name": "local-udp-face-detection",
            "spec": StreamSpec {
                transport: TransportKind::Udp,
                source: Capability::FaceDetection,
                destination: DestinationSpec { host: Some("127.0.0.1".to_string()), port: Some(9999), ..Default::default() },
                filter: None,
                client_id: None,
            },
        }),
        json!({
            "name": "browser-websocket-gaze",
            "spec": StreamSpec {
                transport: TransportKind::Websocket,
                source: Capability::GazeEstimation,
                destination: DestinationSpec { url: Some("wss://localhost/gaze".to_string()), ..Default::default() },
                filter: Some(FilterSpec { min_confidence: Some(0.5), capabilities: None }),
                client_id: None,
            },
        }),
        json!({
            "name": "server-sent-events-expression",
            "spec": StreamSpec {
                transport: TransportKind::Sse,
                source: Capability::ExpressionAnalysis,
                destination: DestinationSpec::default(),
                filter: None,
                client_id: None,
            },
        }),
    ]
}

async fn templates(State(_state): State<AppState>) -> Response {
    envelope::ok(template_list())
}

async fn create_stream(State(state): State<AppState>, Json(spec): Json<StreamSpec>) -> Response {
    match state.sessions.create(spec) {
        Ok(id) => envelope::ok(json!({"id": id})),
        Err(err) => envelope::error(axum::http::StatusCode::BAD_REQUEST, "input_validation", err.to_string()),
    }
}

#[derive(Debug, Default, Deserialize)]
struct StreamListQuery {
    #[serde(default)]
    status: Option<StreamStatus>,
    #[serde(default)]
    transport: Option<TransportKind>,
}

async fn list_streams(State(state): State<AppState>, Query(query): Query<StreamListQuery>) -> Response {
    let filter = StreamListFilter { status: query.status, transport: query.transport };
    envelope::ok(state.sessions.list(filter).await)
}

async fn get_stream(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.sessions.get(id).await {
        Some(stream) => envelope::ok(stream),
        None => envelope::error(axum::http::StatusCode::NOT_FOUND, "input_validation", format!("stream {id} not found")),
    }
}

async fn modify_stream(State(state): State<AppState>, Path(id): Path<Uuid>, Json(patch): Json<StreamPatch>) -> Response {
    match state.sessions.modify(id, patch).await {
        Ok(stream) => envelope::ok(stream),
        Err(err) => session_error_response(err),
    }
}

async fn remove_stream(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.sessions.remove(id).await {
        Ok(()) => envelope::ok(json!({"removed": id})),
        Err(err) => session_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct RecordRequest {
    path: String,
}

async fn record_stream(State(state): State<AppState>, Path(id): Path<Uuid>, Json(body): Json<RecordRequest>) -> Response {
    match state.sessions.record_start(id, &body.path).await {
        Ok(()) => envelope::ok(json!({"recording": id})),
        Err(err) => session_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct ShareRequest {
    destination: DestinationSpec,
}

async fn share_stream(State(state): State<AppState>, Path(id): Path<Uuid>, Json(body): Json<ShareRequest>) -> Response {
    match state.sessions.share(id, body.destination).await {
        Ok(new_id) => envelope::ok(json!({"id": new_id})),
        Err(err) => session_error_response(err),
    }
}

fn session_error_response(err: synopticon_distribution::SessionError) -> Response {
    use synopticon_distribution::SessionError;
    let status = match err {
        SessionError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
        SessionError::InvalidDestination(..) | SessionError::ImmutableField(_) => axum::http::StatusCode::BAD_REQUEST,
        SessionError::Recording(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
    };
    envelope::error(status, "input_validation", err.to_string())
}
