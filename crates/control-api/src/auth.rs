//! Shared-secret header check (spec §1 Non-goals: "no authentication
//! scheme beyond a shared-secret header check"; spec §6: `API_KEY`, header
//! `X-API-Key`).

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::envelope;
use crate::AppState;

const API_KEY_HEADER: &str = "x-api-key";

/// When `API_KEY` is configured, every request must carry a matching
/// `X-API-Key` header. When unset, the check is skipped entirely (spec §6:
/// "optional, if set, required").
pub async fn require_api_key(State(state): State<AppState>, request: Request<axum::body::Body>, next: Next) -> Response {
    let Some(expected) = state.config.api_key.as_deref() else {
        return next.run(request).await;
    };
    let provided = request.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if provided == Some(expected) {
        next.run(request).await
    } else {
        envelope::error(StatusCode::UNAUTHORIZED, "input_validation", "missing or invalid X-API-Key header")
    }
}
