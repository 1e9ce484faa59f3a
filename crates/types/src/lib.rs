//! Canonical data model shared by every Synopticon crate: capability tags,
//! performance profiles, pipeline descriptors/state, analysis results and
//! error records, and the stream/transport types used by the distribution
//! subsystem.
//!
//! Nothing in this crate spawns tasks, holds a lock, or does I/O — it is
//! pure data plus the invariant-preserving constructors spec §4.A requires
//! (`make_success`, `make_failure`).

pub mod capability;
pub mod descriptor;
pub mod error;
pub mod face;
pub mod performance;
pub mod result;
pub mod state;
pub mod stream;

pub use capability::{covers, Capability, CapabilitySet, UnknownCapability};
pub use descriptor::PipelineDescriptor;
pub use error::{format_error_sources, ErrorKind, ErrorRecord, TypesError};
pub use face::{AudioResult, BBox, EyeState, Expression, Face, Gender, Point2D, Pose3dof, Pose6dof};
pub use performance::{Impact, InvalidPerformanceField, PerformanceProfile};
pub use result::AnalysisResult;
pub use state::{PipelineState, EWMA_ALPHA, UNHEALTHY_ERROR_RATE};
pub use stream::{
    DestinationSpec, FilterSpec, RecordedFrame, Stream, StreamPatch, StreamSpec, StreamStats,
    StreamStatus, TransportKind,
};

/// Returns the current wall-clock time in milliseconds since the Unix
/// epoch, clamped to be non-negative (spec §4.A: "timestamps ... must be
/// non-negative").
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
