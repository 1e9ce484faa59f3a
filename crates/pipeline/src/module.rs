use crate::frame::Frame;
use async_trait::async_trait;
use serde_json::Value;
use synopticon_types::{AudioResult, Face};

/// Classification of a module-level failure, mirroring the teacher's
/// per-component `*ErrorKind` enums (`ExporterErrorKind`,
/// `ReceiverErrorKind`) — a small, local taxonomy that the `Pipeline`
/// wrapper maps onto the external `synopticon_types::ErrorKind` at the
/// boundary rather than every module depending on the external taxonomy
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleErrorKind {
    Initialization,
    ModelUnavailable,
    ResourceExhausted,
    Other,
}

#[derive(Debug, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ModuleError {
    pub kind: ModuleErrorKind,
    pub message: String,
}

impl ModuleError {
    pub fn new(kind: ModuleErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Output a module hands back to the `Pipeline` wrapper on a successful
/// `process` call. The wrapper is responsible for timing, state updates and
/// assembling the final `AnalysisResult` — a module never constructs one
/// itself.
#[derive(Debug, Clone, Default)]
pub struct ModuleOutput {
    pub faces: Vec<Face>,
    pub audio: Option<AudioResult>,
    pub metadata: Value,
}

/// The interface every analysis module (face detection, eye tracking,
/// emotion, age, speech, or the media-streaming producer of §4.J) must
/// satisfy. Kept intentionally narrow: the actual CV/ML inference is an
/// external collaborator (spec §1); this trait is the seam.
#[async_trait]
pub trait AnalysisModule: Send + Sync {
    /// Called at most once before the first `process` (enforced by the
    /// `Pipeline` wrapper, not by implementations).
    async fn initialize(&self, _config: &Value) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn process(&self, frame: &Frame) -> Result<ModuleOutput, ModuleError>;

    /// Releases external handles. Default no-op for stateless modules.
    async fn cleanup(&self) {}
}

/// Lets a shared, externally-inspectable module (e.g. a test double whose
/// call count the test wants to read after handing ownership to a
/// `Pipeline`) be used wherever an `AnalysisModule` is expected.
#[async_trait]
impl<T: AnalysisModule + ?Sized> AnalysisModule for std::sync::Arc<T> {
    async fn initialize(&self, config: &Value) -> Result<(), ModuleError> {
        (**self).initialize(config).await
    }

    async fn process(&self, frame: &Frame) -> Result<ModuleOutput, ModuleError> {
        (**self).process(frame).await
    }

    async fn cleanup(&self) {
        (**self).cleanup().await
    }
}
