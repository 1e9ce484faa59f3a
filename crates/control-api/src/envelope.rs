//! The uniform `{success, data?, error?, timestamp}` response envelope
//! every route in spec §6 returns, success or failure alike.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use synopticon_types::now_ms;

#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    pub timestamp: i64,
}

/// Wraps `data` into a `success: true` envelope with HTTP 200.
pub fn ok<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(Envelope { success: true, data: Some(serde_json::to_value(data).unwrap_or(Value::Null)), error: None, timestamp: now_ms() }),
    )
        .into_response()
}

/// Wraps an error into a `success: false` envelope at the given HTTP
/// status (spec §7's per-`ErrorKind` posture table).
pub fn error(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(Envelope {
            success: false,
            data: None,
            error: Some(serde_json::json!({"kind": kind, "message": message.into()})),
            timestamp: now_ms(),
        }),
    )
        .into_response()
}
