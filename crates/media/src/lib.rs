//! The media streaming pipeline (spec §4.J): a `Pipeline` that is also a
//! frame *source*. It holds a (possibly absent) device handle and accepts
//! `START_STREAM`/`STOP_STREAM`/`CHANGE_QUALITY` commands through the
//! ordinary `process` seam; once started it paces synthetic or
//! device-backed frames out through a caller-supplied callback, dropping
//! frames the callback can't keep up with rather than blocking the
//! producer loop.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use synopticon_distribution::QualityLevel;
use synopticon_pipeline::{AnalysisModule, Frame, ModuleError, ModuleErrorKind, ModuleOutput};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Capacity of the producer-to-consumer frame channel (spec §4.J: "bounded
/// queue of 30 frames").
const FRAME_QUEUE_CAPACITY: usize = 30;

#[derive(Debug, Deserialize)]
struct CommandPayload {
    action: String,
    #[serde(default)]
    parameters: Value,
}

/// A parsed, validated command frame. `process` decodes one of these out of
/// `Frame::data` (which carries the command as JSON bytes, the same opaque
/// `Vec<u8>` any other pipeline's frame payload uses).
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCommand {
    StartStream,
    StopStream,
    ChangeQuality(QualityLevel),
}

impl MediaCommand {
    fn parse(raw: &[u8]) -> Result<Self, ModuleError> {
        let payload: CommandPayload = serde_json::from_slice(raw)
            .map_err(|e| ModuleError::new(ModuleErrorKind::Other, format!("malformed command frame: {e}")))?;
        match payload.action.to_uppercase().as_str() {
            "START_STREAM" => Ok(MediaCommand::StartStream),
            "STOP_STREAM" => Ok(MediaCommand::StopStream),
            "CHANGE_QUALITY" => {
                let quality_str = payload
                    .parameters
                    .get("quality")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ModuleError::new(ModuleErrorKind::Other, "CHANGE_QUALITY requires a `quality` parameter"))?;
                let level = parse_quality(quality_str)
                    .ok_or_else(|| ModuleError::new(ModuleErrorKind::Other, format!("unknown quality level {quality_str:?}")))?;
                Ok(MediaCommand::ChangeQuality(level))
            }
            other => Err(ModuleError::new(ModuleErrorKind::Other, format!("unknown media command {other:?}"))),
        }
    }
}

fn parse_quality(raw: &str) -> Option<QualityLevel> {
    QualityLevel::DESCENDING.iter().copied().find(|level| format!("{level:?}").eq_ignore_ascii_case(raw))
}

/// Frame hand-off sink. The orchestrator side registers one of these so the
/// producer task can push frames on without itself depending on
/// `synopticon-orchestrator` (which would be a dependency cycle: the
/// orchestrator depends on `synopticon-pipeline`, which this crate already
/// depends on).
pub type FrameSink = Arc<dyn Fn(Frame) + Send + Sync>;

/// The device-bound producer module (spec §4.J). When `device_available` is
/// false it runs in "server mode", producing empty frames at the
/// configured quality's fps instead of failing — the spec treats an absent
/// camera/microphone as a normal deployment shape, not an error.
pub struct MediaStreamingModule {
    source_id: String,
    device_available: bool,
    sink: FrameSink,
    quality: Arc<Mutex<QualityLevel>>,
    running: Arc<AtomicBool>,
    producer: Mutex<Option<JoinHandle<()>>>,
    frames_emitted: Arc<AtomicU64>,
    frames_dropped: Arc<AtomicU64>,
    sequence: Arc<AtomicU32>,
}

impl MediaStreamingModule {
    pub fn new(source_id: impl Into<String>, device_available: bool, sink: FrameSink) -> Self {
        Self {
            source_id: source_id.into(),
            device_available,
            sink,
            quality: Arc::new(Mutex::new(QualityLevel::High)),
            running: Arc::new(AtomicBool::new(false)),
            producer: Mutex::new(None),
            frames_emitted: Arc::new(AtomicU64::new(0)),
            frames_dropped: Arc::new(AtomicU64::new(0)),
            sequence: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted.load(Ordering::SeqCst)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::SeqCst)
    }

    async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let (tx, mut rx) = mpsc::channel::<Frame>(FRAME_QUEUE_CAPACITY);
        let running = self.running.clone();
        let quality = self.quality.clone();
        let source_id = self.source_id.clone();
        let device_available = self.device_available;
        let sequence = self.sequence.clone();
        let frames_dropped = self.frames_dropped.clone();

        let pace_handle = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                let fps = quality.lock().await.target_fps().max(1);
                tokio::time::sleep(Duration::from_millis(1000 / fps as u64)).await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let seq = sequence.fetch_add(1, Ordering::SeqCst);
                let data = if device_available { vec![0u8; 1] } else { Vec::new() };
                let frame = Frame::new(source_id.clone(), synopticon_types::now_ms(), data, Default::default());
                if tx.try_send(frame).is_err() {
                    // Downstream can't keep up with the paced producer;
                    // drop this frame rather than block the pacing loop
                    // (spec §4.J).
                    frames_dropped.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        let sink = self.sink.clone();
        let frames_emitted = self.frames_emitted.clone();
        let drain_handle = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                frames_emitted.fetch_add(1, Ordering::SeqCst);
                sink(frame);
            }
        });

        *self.producer.lock().await = Some(tokio::spawn(async move {
            let _ = pace_handle.await;
            let _ = drain_handle.await;
        }));
        info!(source = %self.source_id, device_available, "media streaming started");
    }

    async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.producer.lock().await.take() {
            handle.abort();
        }
        info!(source = %self.source_id, "media streaming stopped");
    }

    async fn change_quality(&self, level: QualityLevel) {
        *self.quality.lock().await = level;
        warn!(source = %self.source_id, ?level, "media streaming quality changed");
    }
}

#[async_trait]
impl AnalysisModule for MediaStreamingModule {
    async fn process(&self, frame: &Frame) -> Result<ModuleOutput, ModuleError> {
        let command = MediaCommand::parse(&frame.data)?;
        match command {
            MediaCommand::StartStream => self.start().await,
            MediaCommand::StopStream => self.stop().await,
            MediaCommand::ChangeQuality(level) => self.change_quality(level).await,
        }
        Ok(ModuleOutput {
            faces: Vec::new(),
            audio: None,
            metadata: json!({
                "streaming": self.is_streaming(),
                "frames_emitted": self.frames_emitted(),
                "frames_dropped": self.frames_dropped(),
            }),
        })
    }

    async fn cleanup(&self) {
        self.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::time::timeout;

    fn command_frame(json: Value) -> Frame {
        Frame::new("cam0", 0, serde_json::to_vec(&json).unwrap(), Default::default())
    }

    #[tokio::test]
    async fn start_stream_runs_in_synthetic_mode_without_a_device() {
        let received: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
        let counted = received.clone();
        let sink: FrameSink = Arc::new(move |_frame| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        let module = MediaStreamingModule::new("cam0", false, sink);

        module.process(&command_frame(json!({"action": "START_STREAM"}))).await.unwrap();
        assert!(module.is_streaming());

        // High quality paces at 30fps (~33ms/frame); wait long enough for
        // several frames to have been produced and drained.
        let _ = timeout(Duration::from_millis(500), async {
            while received.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(received.load(Ordering::SeqCst) > 0);

        module.process(&command_frame(json!({"action": "STOP_STREAM"}))).await.unwrap();
        assert!(!module.is_streaming());
    }

    #[tokio::test]
    async fn change_quality_updates_pacing_target() {
        let sink: FrameSink = Arc::new(|_frame| {});
        let module = MediaStreamingModule::new("cam0", false, sink);
        module
            .process(&command_frame(json!({"action": "CHANGE_QUALITY", "parameters": {"quality": "mobile"}})))
            .await
            .unwrap();
        assert_eq!(*module.quality.lock().await, QualityLevel::Mobile);
    }

    #[tokio::test]
    async fn unknown_command_is_rejected() {
        let sink: FrameSink = Arc::new(|_frame| {});
        let module = MediaStreamingModule::new("cam0", false, sink);
        let result = module.process(&command_frame(json!({"action": "DANCE"}))).await;
        assert!(result.is_err());
    }
}
