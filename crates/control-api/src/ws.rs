//! `GET /ws` (spec §4.I, §6): the event-bus bridge. A connecting client is
//! greeted with a `connected` event carrying the current stream list and
//! overall health, then sees every bus event as it's published. Messages
//! the client sends are rate-limited and validated without ever closing
//! the socket over a bad one (spec §4.I: "errors isolated").

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::time::{Duration, Instant};
use synopticon_distribution::StreamListFilter;
use synopticon_events::Event;
use tracing::warn;

use crate::AppState;

/// Spec §6 WebSocket channel section: "at most 10 client messages per
/// second".
pub const WS_RATE_LIMIT_PER_SECOND: u32 = 10;
/// Spec §6: "messages over 64 KiB are rejected".
pub const WS_MAX_MESSAGE_BYTES: usize = 64 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade)).route("/api/distribution/events", get(upgrade))
}

async fn upgrade(State(state): State<AppState>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    if let Some(origin) = headers.get(axum::http::header::ORIGIN).and_then(|v| v.to_str().ok()) {
        if !state.config.origin_allowed(origin) {
            return axum::http::StatusCode::FORBIDDEN.into_response();
        }
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// A simple fixed-window counter: at most `WS_RATE_LIMIT_PER_SECOND`
/// client messages accepted per rolling one-second window.
struct RateLimiter {
    window_start: Instant,
    count: u32,
}

impl RateLimiter {
    fn new() -> Self {
        Self { window_start: Instant::now(), count: 0 }
    }

    fn allow(&mut self) -> bool {
        if self.window_start.elapsed() >= Duration::from_secs(1) {
            self.window_start = Instant::now();
            self.count = 0;
        }
        self.count += 1;
        self.count <= WS_RATE_LIMIT_PER_SECOND
    }
}

fn event_to_text(event: &Event) -> String {
    serde_json::to_string(&json!({"type": event.topic, "payload": event.payload, "ts": event.ts})).unwrap_or_default()
}

async fn greeting(state: &AppState) -> String {
    let streams = state.sessions.list(StreamListFilter::default()).await;
    let health = state.orchestrator.get_health().await;
    serde_json::to_string(&json!({
        "type": "connected",
        "streams": streams,
        "overall": health.overall,
    }))
    .unwrap_or_default()
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    if socket.send(Message::Text(greeting(&state).await.into())).await.is_err() {
        return;
    }

    let mut events = state.events.subscribe();
    let mut limiter = RateLimiter::new();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if socket.send(Message::Text(event_to_text(&event).into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "ws client lagged behind the event bus");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.next() => {
                let Some(message) = incoming else { break };
                let Ok(message) = message else { break };
                match message {
                    Message::Close(_) => break,
                    Message::Ping(payload) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Text(text) => {
                        if !on_client_message(&mut socket, &mut limiter, text.as_bytes()).await {
                            break;
                        }
                    }
                    Message::Binary(data) => {
                        if !on_client_message(&mut socket, &mut limiter, &data).await {
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Validates one inbound client message and answers `{"type":"ping"}`
/// with `{"type":"pong"}` (spec §6). Returns `false` only on a
/// transport-level send failure, which tears down the connection; a
/// malformed or rate-limited message gets an `{"type": "error", ...}`
/// frame back and the loop continues.
async fn on_client_message(socket: &mut WebSocket, limiter: &mut RateLimiter, bytes: &[u8]) -> bool {
    if bytes.len() > WS_MAX_MESSAGE_BYTES {
        return send_error(socket, "message exceeds the 64 KiB limit").await;
    }
    if !limiter.allow() {
        return send_error(socket, "rate limit exceeded: 10 messages/second").await;
    }
    let parsed = match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(value) => value,
        Err(_) => return send_error(socket, "message is not valid JSON").await,
    };
    if parsed.get("type").and_then(|t| t.as_str()) == Some("ping") {
        let payload = serde_json::to_string(&json!({"type": "pong"})).unwrap_or_default();
        return socket.send(Message::Text(payload.into())).await.is_ok();
    }
    true
}

async fn send_error(socket: &mut WebSocket, reason: &str) -> bool {
    let payload = serde_json::to_string(&json!({"type": "error", "reason": reason})).unwrap_or_default();
    socket.send(Message::Text(payload.into())).await.is_ok()
}
