use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Local failure taxonomy for transport-level sinks, mirroring
/// `synopticon_pipeline::ModuleErrorKind` — a small per-component enum
/// mapped onto stream stats rather than the external `ErrorKind` directly
/// (spec §7: "Distributors never surface their errors to the orchestrator;
/// they record into stream stats and emit `stream_failed`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributorErrorKind {
    ConnectFailed,
    SendFailed,
    PayloadTooLarge,
    Closed,
}

#[derive(Debug, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct DistributorError {
    pub kind: DistributorErrorKind,
    pub message: String,
}

impl DistributorError {
    pub fn new(kind: DistributorErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct DistributorHealth {
    pub connected: bool,
    pub queue_depth: usize,
    pub dropped: u64,
}

/// The seam every per-transport sink implements (spec §4.G). `send` may
/// only block long enough to enqueue into the distributor's own internal
/// buffer — the actual I/O runs on a distributor-owned task, so a slow or
/// unreachable sink never stalls the stream session manager or the
/// orchestrator.
#[async_trait]
pub trait Distributor: Send + Sync {
    async fn connect(&self) -> Result<(), DistributorError>;

    async fn send(&self, stream: Uuid, payload: &[u8]) -> Result<(), DistributorError>;

    async fn disconnect(&self);

    fn health(&self) -> DistributorHealth;

    /// Lets the control API reach the SSE broadcast channel behind a
    /// stream without every caller matching on `TransportKind` and
    /// downcasting by hand. `None` for every transport but SSE.
    fn as_sse(&self) -> Option<&crate::sse::SseDistributor> {
        None
    }
}
