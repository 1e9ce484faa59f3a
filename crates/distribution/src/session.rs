use crate::distributor::{Distributor, DistributorHealth};
use crate::http::HttpDistributor;
use crate::mqtt::MqttDistributor;
use crate::quality::{NetworkStats, QualityController, QualityControllerConfig, QualityLevel};
use crate::queue::DropOldestQueue;
use crate::recording::RecordingSink;
use crate::sse::SseDistributor;
use crate::udp::UdpDistributor;
use crate::websocket::WebSocketDistributor;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use synopticon_events::{topics, EventBus};
use synopticon_types::{
    now_ms, AnalysisResult, Capability, DestinationSpec, RecordedFrame, Stream, StreamPatch, StreamSpec, StreamStats,
    StreamStatus, TransportKind,
};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

/// Default per-stream bound from spec §4.F ("bounded per-stream queue
/// (default 256 messages)").
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default from spec §4.F ("on reaching `fail_threshold` (default 10) the
/// stream transitions to `failed`").
const DEFAULT_FAIL_THRESHOLD: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("stream {0} was not found")]
    NotFound(Uuid),
    #[error("invalid destination for {0:?}: {1}")]
    InvalidDestination(TransportKind, String),
    #[error("field {0} is immutable once a stream is created")]
    ImmutableField(&'static str),
    #[error("recording sink error: {0}")]
    Recording(String),
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub queue_capacity: usize,
    pub fail_threshold: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { queue_capacity: DEFAULT_QUEUE_CAPACITY, fail_threshold: DEFAULT_FAIL_THRESHOLD }
    }
}

/// One distributor's live health, tagged with the stream it belongs to.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DistributorStatus {
    pub stream_id: Uuid,
    pub transport: TransportKind,
    pub health: DistributorHealth,
}

/// Aggregated stream counts and per-distributor health (spec §6
/// `/api/distribution/status`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct DistributionStatus {
    pub total_streams: usize,
    pub by_status: std::collections::BTreeMap<String, u64>,
    pub by_transport: std::collections::BTreeMap<String, u64>,
    pub distributors: Vec<DistributorStatus>,
}

#[derive(Default, Clone, Copy)]
pub struct StreamListFilter {
    pub status: Option<StreamStatus>,
    pub transport: Option<TransportKind>,
}

impl StreamListFilter {
    fn matches(&self, stream: &Stream) -> bool {
        self.status.map(|s| s == stream.status).unwrap_or(true) && self.transport.map(|t| t == stream.transport).unwrap_or(true)
    }
}

struct StreamEntry {
    stream: Stream,
    distributor: Arc<dyn Distributor>,
    consecutive_send_failures: u32,
    recording: Option<Arc<RecordingSink>>,
    quality: Option<QualityController>,
}

struct StreamHandle {
    entry: Mutex<StreamEntry>,
    queue: Arc<DropOldestQueue<Vec<u8>>>,
    shutdown: Notify,
}

/// Owns every live `Stream` and its distributor (spec §4.F, §3 Ownership:
/// "distributors hold only the `id`"). Each stream has its own drain task
/// pulling off a bounded drop-oldest queue so a slow or dead sink never
/// blocks `submit` or the orchestrator that feeds it.
pub struct StreamSessionManager {
    streams: DashMap<Uuid, Arc<StreamHandle>>,
    events: Arc<EventBus>,
    config: SessionConfig,
}

fn validate_destination(transport: TransportKind, destination: &DestinationSpec) -> Result<(), SessionError> {
    let ok = match transport {
        TransportKind::Udp => destination.host.is_some() && destination.port.is_some(),
        TransportKind::Http => destination.url.is_some(),
        TransportKind::Websocket => destination.url.is_some(),
        TransportKind::Mqtt => destination.host.is_some() && destination.port.is_some() && destination.topic_prefix.is_some(),
        TransportKind::Sse => true,
    };
    if ok {
        Ok(())
    } else {
        Err(SessionError::InvalidDestination(transport, "missing required destination fields for this transport".to_string()))
    }
}

fn build_distributor(
    transport: TransportKind,
    destination: &DestinationSpec,
    source: Capability,
) -> Result<Arc<dyn Distributor>, SessionError> {
    validate_destination(transport, destination)?;
    let distributor: Arc<dyn Distributor> = match transport {
        TransportKind::Udp => Arc::new(UdpDistributor::new(destination.host.clone().unwrap(), destination.port.unwrap())),
        TransportKind::Http => Arc::new(HttpDistributor::new(destination.url.clone().unwrap(), 20, Duration::from_millis(500))),
        TransportKind::Websocket => Arc::new(WebSocketDistributor::new(destination.url.clone().unwrap())),
        TransportKind::Mqtt => Arc::new(MqttDistributor::new(
            destination.host.clone().unwrap(),
            destination.port.unwrap(),
            destination.topic_prefix.clone().unwrap(),
            source,
            destination.qos.unwrap_or(0),
        )),
        TransportKind::Sse => Arc::new(SseDistributor::new()),
    };
    Ok(distributor)
}

impl StreamSessionManager {
    pub fn new(events: Arc<EventBus>, config: SessionConfig) -> Self {
        Self { streams: DashMap::new(), events, config }
    }

    pub fn create(&self, spec: StreamSpec) -> Result<Uuid, SessionError> {
        let distributor = build_distributor(spec.transport, &spec.destination, spec.source)?;
        let id = Uuid::new_v4();
        let stream = Stream {
            id,
            transport: spec.transport,
            source: spec.source,
            destination: spec.destination,
            filter: spec.filter,
            client_id: spec.client_id,
            created_at: now_ms(),
            status: StreamStatus::Pending,
            stats: StreamStats::default(),
        };
        let entry = StreamEntry { stream, distributor, consecutive_send_failures: 0, recording: None, quality: None };
        let handle = Arc::new(StreamHandle {
            entry: Mutex::new(entry),
            queue: DropOldestQueue::new(self.config.queue_capacity),
            shutdown: Notify::new(),
        });
        let _ = self.streams.insert(id, handle.clone());
        spawn_drain_loop(id, handle, self.events.clone(), self.config.fail_threshold);
        self.events.publish(
            topics::STREAM_CREATED,
            serde_json::json!({"id": id, "type": spec.transport, "source": spec.source}),
            now_ms(),
        );
        Ok(id)
    }

    pub async fn modify(&self, id: Uuid, patch: StreamPatch) -> Result<Stream, SessionError> {
        let handle = self.streams.get(&id).map(|e| e.value().clone()).ok_or(SessionError::NotFound(id))?;
        let mut entry = handle.entry.lock().await;

        if let Some(destination) = patch.destination {
            if !entry.stream.transport.is_connectionless() {
                return Err(SessionError::ImmutableField("destination"));
            }
            validate_destination(entry.stream.transport, &destination)?;
            entry.stream.destination = destination;
        }
        if let Some(filter) = patch.filter {
            entry.stream.filter = Some(filter);
        }
        if let Some(status) = patch.status {
            if matches!(status, StreamStatus::Paused | StreamStatus::Active) {
                entry.stream.status = status;
            }
        }
        Ok(entry.stream.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), SessionError> {
        let handle = self.streams.get(&id).map(|e| e.value().clone()).ok_or(SessionError::NotFound(id))?;
        {
            let mut entry = handle.entry.lock().await;
            entry.stream.status = StreamStatus::Closed;
            entry.distributor.disconnect().await;
            if let Some(recording) = entry.recording.take() {
                recording.close().await;
            }
        }
        handle.shutdown.notify_waiters();
        let _ = self.streams.remove(&id);
        self.events.publish(topics::STREAM_CLOSED, serde_json::json!({"id": id}), now_ms());
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Option<Stream> {
        let handle = self.streams.get(&id).map(|e| e.value().clone())?;
        let entry = handle.entry.lock().await;
        Some(entry.stream.clone())
    }

    /// Aggregated counts + per-stream distributor health, the payload of
    /// `GET /api/distribution/status` (spec §6).
    pub async fn status(&self) -> DistributionStatus {
        let handles: Vec<Arc<StreamHandle>> = self.streams.iter().map(|e| e.value().clone()).collect();
        let mut by_status: std::collections::BTreeMap<String, u64> = std::collections::BTreeMap::new();
        let mut by_transport: std::collections::BTreeMap<String, u64> = std::collections::BTreeMap::new();
        let mut distributors = Vec::with_capacity(handles.len());
        for handle in handles {
            let entry = handle.entry.lock().await;
            *by_status.entry(format!("{:?}", entry.stream.status).to_lowercase()).or_insert(0) += 1;
            *by_transport.entry(format!("{:?}", entry.stream.transport).to_lowercase()).or_insert(0) += 1;
            distributors.push(DistributorStatus {
                stream_id: entry.stream.id,
                transport: entry.stream.transport,
                health: entry.distributor.health(),
            });
        }
        DistributionStatus { total_streams: distributors.len(), by_status, by_transport, distributors }
    }

    pub async fn list(&self, filter: StreamListFilter) -> Vec<Stream> {
        let handles: Vec<Arc<StreamHandle>> = self.streams.iter().map(|e| e.value().clone()).collect();
        let mut result = Vec::with_capacity(handles.len());
        for handle in handles {
            let entry = handle.entry.lock().await;
            if filter.matches(&entry.stream) {
                result.push(entry.stream.clone());
            }
        }
        result
    }

    /// Returns the live SSE broadcast receiver backing a stream, if it is
    /// both found and actually an SSE stream. Used by the control API's
    /// `GET /api/distribution/streams/{id}/events` handler to bridge a
    /// stream to an HTTP response body.
    pub async fn sse_subscribe(&self, id: Uuid) -> Option<tokio::sync::broadcast::Receiver<Vec<u8>>> {
        let handle = self.streams.get(&id).map(|e| e.value().clone())?;
        let entry = handle.entry.lock().await;
        entry.distributor.as_sse().map(|sse| sse.subscribe())
    }

    /// Enables adaptive quality control for a stream, starting at `initial`
    /// (spec §4.H, optional per stream).
    pub async fn enable_quality_control(&self, id: Uuid, initial: QualityLevel, config: QualityControllerConfig) -> Result<(), SessionError> {
        let handle = self.streams.get(&id).map(|e| e.value().clone()).ok_or(SessionError::NotFound(id))?;
        handle.entry.lock().await.quality = Some(QualityController::new(config, initial));
        Ok(())
    }

    /// Feeds one network-stats sample into a stream's quality controller,
    /// if enabled. Publishes `quality_change` when the level actually
    /// moves (spec §4.H: "Every level change emits a `quality_change`
    /// event on the event bus"). A no-op for streams without quality
    /// control enabled.
    pub async fn report_network_stats(&self, id: Uuid, stats: NetworkStats) -> Result<Option<QualityLevel>, SessionError> {
        let handle = self.streams.get(&id).map(|e| e.value().clone()).ok_or(SessionError::NotFound(id))?;
        let mut entry = handle.entry.lock().await;
        let Some(controller) = entry.quality.as_mut() else {
            return Ok(None);
        };
        let changed = controller.observe(stats, Instant::now());
        if let Some(level) = changed {
            self.events
                .publish(topics::QUALITY_CHANGE, serde_json::json!({"id": id, "level": level}), now_ms());
        }
        Ok(changed)
    }

    pub async fn record_start(&self, id: Uuid, path: impl AsRef<std::path::Path>) -> Result<(), SessionError> {
        let handle = self.streams.get(&id).map(|e| e.value().clone()).ok_or(SessionError::NotFound(id))?;
        let sink = Arc::new(RecordingSink::new());
        sink.open(path).await.map_err(|e| SessionError::Recording(e.to_string()))?;
        handle.entry.lock().await.recording = Some(sink);
        Ok(())
    }

    pub async fn record_stop(&self, id: Uuid) -> Result<(), SessionError> {
        let handle = self.streams.get(&id).map(|e| e.value().clone()).ok_or(SessionError::NotFound(id))?;
        if let Some(sink) = handle.entry.lock().await.recording.take() {
            sink.close().await;
        }
        Ok(())
    }

    /// Multiplexes a stream to a second destination by creating a sibling
    /// stream that shares `source` and `filter` (spec §4.F: "implemented by
    /// creating a secondary stream sharing source + filter").
    pub async fn share(&self, id: Uuid, second_destination: DestinationSpec) -> Result<Uuid, SessionError> {
        let original = self.get(id).await.ok_or(SessionError::NotFound(id))?;
        self.create(StreamSpec {
            transport: original.transport,
            source: original.source,
            destination: second_destination,
            filter: original.filter,
            client_id: original.client_id,
        })
    }

    /// Fans one orchestrator result out to every active, non-paused stream
    /// whose `source` matches and whose filter accepts it (spec §3
    /// Ownership: streams forward orchestrator results; §4.F fire-and-forget
    /// enqueue). Paused streams drop the message rather than buffering it,
    /// so a resumed stream never replays a backlog it missed.
    pub async fn submit(&self, source: Capability, result: &AnalysisResult) {
        let confidence = match result {
            AnalysisResult::Success { faces, .. } => faces.iter().map(|f| f.confidence).fold(None, |acc: Option<f64>, c| {
                Some(acc.map(|a| a.max(c)).unwrap_or(c))
            }),
            AnalysisResult::Failure { .. } => None,
        };
        let Ok(payload) = serde_json::to_vec(result) else { return };

        let handles: Vec<Arc<StreamHandle>> = self.streams.iter().map(|e| e.value().clone()).collect();
        for handle in handles {
            let matches = {
                let entry = handle.entry.lock().await;
                entry.stream.source == source
                    && !matches!(entry.stream.status, StreamStatus::Closed | StreamStatus::Failed | StreamStatus::Paused)
                    && entry.stream.filter.as_ref().map(|f| f.matches(confidence)).unwrap_or(true)
            };
            if matches {
                let was_dropped = handle.queue.push(payload.clone());
                if was_dropped {
                    let mut entry = handle.entry.lock().await;
                    entry.stream.stats.dropped += 1;
                }
            }
        }
    }
}

fn spawn_drain_loop(id: Uuid, handle: Arc<StreamHandle>, events: Arc<EventBus>, fail_threshold: u32) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = handle.queue.wait_for_items() => {}
                _ = handle.shutdown.notified() => break,
            }
            let batch = handle.queue.drain();
            if batch.is_empty() {
                let entry = handle.entry.lock().await;
                if entry.stream.status == StreamStatus::Closed {
                    break;
                }
                continue;
            }

            for payload in batch {
                let mut entry = handle.entry.lock().await;
                if entry.stream.status == StreamStatus::Closed {
                    break;
                }
                let send_result = entry.distributor.send(id, &payload).await;
                match send_result {
                    Ok(()) => {
                        entry.consecutive_send_failures = 0;
                        entry.stream.stats.messages += 1;
                        entry.stream.stats.bytes += payload.len() as u64;
                        entry.stream.stats.last_ts = now_ms();
                        if entry.stream.status == StreamStatus::Pending {
                            entry.stream.status = StreamStatus::Active;
                        }
                        if let Some(recording) = entry.recording.clone() {
                            if let Ok(value) = serde_json::from_slice(&payload) {
                                let _ = recording.write(&RecordedFrame { ts: now_ms(), stream: id, payload: value }).await;
                            }
                        }
                    }
                    Err(_) => {
                        entry.stream.stats.errors += 1;
                        entry.consecutive_send_failures += 1;
                        if entry.consecutive_send_failures >= fail_threshold {
                            entry.stream.status = StreamStatus::Failed;
                            events.publish(topics::STREAM_FAILED, serde_json::json!({"id": id}), now_ms());
                        }
                    }
                }
            }
        }
    });
}
