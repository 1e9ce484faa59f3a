use crate::capability::Capability;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Udp,
    Mqtt,
    Websocket,
    Http,
    Sse,
}

impl TransportKind {
    /// Whether the wire order of messages delivered to this transport's
    /// queue is preserved end to end (spec §5 "Ordering guarantees").
    pub fn preserves_order(&self) -> bool {
        !matches!(self, TransportKind::Udp)
    }

    /// Whether the sink is connectionless, which affects which `Stream`
    /// fields `modify` may mutate (spec §4.F).
    pub fn is_connectionless(&self) -> bool {
        matches!(self, TransportKind::Udp | TransportKind::Http)
    }
}

/// Per-transport connection target. Only the fields relevant to `type` are
/// populated; validated by `StreamSessionManager::create` against `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DestinationSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qos: Option<u8>,
}

/// Optional result filtering applied before a result reaches a stream's
/// distributor (e.g. minimum confidence, capability subset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FilterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<Capability>>,
}

impl FilterSpec {
    pub fn matches(&self, confidence: Option<f64>) -> bool {
        match (self.min_confidence, confidence) {
            (Some(min), Some(actual)) => actual >= min,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Pending,
    Active,
    Paused,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct StreamStats {
    pub bytes: u64,
    pub messages: u64,
    pub errors: u64,
    pub dropped: u64,
    pub last_ts: i64,
}

/// A live subscription forwarding orchestrator results to an external sink.
/// Owned exclusively by the `StreamSessionManager`; distributors hold only
/// the `id` (spec §3 Ownership).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub transport: TransportKind,
    pub source: Capability,
    pub destination: DestinationSpec,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filter: Option<FilterSpec>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_id: Option<String>,
    pub created_at: i64,
    pub status: StreamStatus,
    pub stats: StreamStats,
}

/// Caller-supplied specification used to create a new stream (request
/// body of `POST /api/distribution/streams`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSpec {
    #[serde(rename = "type")]
    pub transport: TransportKind,
    pub source: Capability,
    pub destination: DestinationSpec,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filter: Option<FilterSpec>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_id: Option<String>,
}

/// Patch applied by `PUT /api/distribution/streams/{id}`. Immutable fields
/// (`type`, `source`, `id`) are not representable here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StreamPatch {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filter: Option<FilterSpec>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub destination: Option<DestinationSpec>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<StreamStatus>,
}

/// A persisted recording-sink line format: `{"ts": ns, "stream": id,
/// "payload": <result>}` (spec §6 "Persistent state").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub ts: i64,
    pub stream: Uuid,
    pub payload: Value,
}
