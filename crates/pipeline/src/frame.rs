use serde_json::Value;
use synopticon_types::CapabilitySet;

/// One unit of work handed to a pipeline's `process`. Raw media bytes are
/// kept as an opaque buffer — decoding into pixels/samples is the job of
/// the CV/ML model implementation, an external collaborator per spec §1.
#[derive(Debug, Clone)]
pub struct Frame {
    pub source_id: String,
    pub timestamp: i64,
    pub data: Vec<u8>,
    /// Capabilities the caller is asking this frame to be analyzed for;
    /// used by the media streaming pipeline's command frames and by
    /// `/api/detect` to narrow what a multi-capability pipeline computes.
    pub requested_capabilities: CapabilitySet,
    pub metadata: Value,
}

impl Frame {
    pub fn new(source_id: impl Into<String>, timestamp: i64, data: Vec<u8>, requested_capabilities: CapabilitySet) -> Self {
        Self {
            source_id: source_id.into(),
            timestamp,
            data,
            requested_capabilities,
            metadata: Value::Null,
        }
    }
}
