use serde::{Deserialize, Serialize};
use std::fmt;

/// External error taxonomy carried on every `ErrorRecord` and used to pick
/// an HTTP response posture (spec §7). This is intentionally flat — richer,
/// crate-local `thiserror` enums (e.g. in `synopticon-distribution`) map
/// down into one of these variants at the component boundary rather than
/// leaking their own detail externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputValidation,
    Initialization,
    ProcessingTimeout,
    ModelUnavailable,
    ResourceExhausted,
    DownstreamFailure,
    CircuitOpen,
    Unknown,
}

impl ErrorKind {
    /// Whether a failure of this kind counts toward a pipeline's circuit
    /// breaker. `input_validation` is excluded per spec §4.E: "the fault is
    /// the caller's."
    pub fn counts_toward_breaker(&self) -> bool {
        !matches!(self, ErrorKind::InputValidation)
    }

    /// Whether a caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::ProcessingTimeout
                | ErrorKind::ModelUnavailable
                | ErrorKind::ResourceExhausted
                | ErrorKind::DownstreamFailure
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InputValidation => "input_validation",
            ErrorKind::Initialization => "initialization",
            ErrorKind::ProcessingTimeout => "processing_timeout",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::DownstreamFailure => "downstream_failure",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A structured, externally-serializable record of a pipeline failure.
/// `AnalysisResult::Failure` always carries one of these; pipeline failures
/// are never allowed to propagate as Rust panics or bare `Result::Err` past
/// the `Pipeline` wrapper (spec §7 "Propagation policy").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub pipeline: String,
    pub timestamp: i64,
    pub retryable: bool,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>, pipeline: impl Into<String>, timestamp: i64) -> Self {
        let retryable = kind.is_retryable();
        Self {
            kind,
            message: message.into(),
            pipeline: pipeline.into(),
            timestamp,
            retryable,
        }
    }
}

/// Flattens an error's `source()` chain into a single display string, for
/// logging context without leaking internals into the external API
/// envelope.
pub fn format_error_sources(error: &(dyn std::error::Error + 'static)) -> String {
    let mut segments = Vec::new();
    let mut current = error.source();
    while let Some(err) = current {
        let msg = err.to_string();
        if !msg.is_empty() {
            segments.push(msg);
        }
        current = err.source();
    }
    if segments.is_empty() {
        String::new()
    } else {
        format!("; source: {}", segments.join(" -> "))
    }
}

/// Errors surfaced directly by the `synopticon-types` crate itself (mostly
/// input-boundary parsing failures). Component crates define their own
/// richer error enums and convert into `ErrorRecord`/`ErrorKind` rather than
/// reusing this type, matching the teacher's per-component
/// `ExporterErrorKind`/`ReceiverErrorKind` split backed by one untyped
/// `Error` at the seams.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("unknown capability: {0}")]
    UnknownCapability(String),
    #[error("invalid performance profile field: {0}")]
    InvalidPerformance(String),
}
