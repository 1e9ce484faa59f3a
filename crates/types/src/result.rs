use crate::error::ErrorRecord;
use crate::face::{AudioResult, Face};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The canonical, immutable outcome of one `Orchestrator::process` attempt
/// against one pipeline. A tagged union at the wire level (`{"status":
/// "success", ...}` / `{"status": "failure", ...}`) so that `R2` (JSON
/// round-trip) and `I5` ("exactly one of success/failure holds") are
/// enforced by the type system rather than by convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisResult {
    Success {
        id: Uuid,
        source: String,
        timestamp: i64,
        processing_time_ms: f64,
        faces: Vec<Face>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        audio: Option<AudioResult>,
        #[serde(default)]
        metadata: Value,
        /// How many pipelines were tried before this one succeeded (0 =
        /// first try). Populated by the orchestrator, not by the pipeline
        /// itself.
        #[serde(default)]
        fallback_depth: u32,
    },
    Failure {
        id: Uuid,
        source: String,
        timestamp: i64,
        error: ErrorRecord,
    },
}

impl AnalysisResult {
    pub fn make_success(
        source: impl Into<String>,
        timestamp: i64,
        processing_time_ms: f64,
        faces: Vec<Face>,
        audio: Option<AudioResult>,
        metadata: Value,
    ) -> Self {
        debug_assert!(timestamp >= 0, "timestamps must be non-negative");
        AnalysisResult::Success {
            id: Uuid::new_v4(),
            source: source.into(),
            timestamp,
            processing_time_ms,
            faces,
            audio,
            metadata,
            fallback_depth: 0,
        }
    }

    pub fn make_failure(error: ErrorRecord, timestamp: i64) -> Self {
        debug_assert!(timestamp >= 0, "timestamps must be non-negative");
        AnalysisResult::Failure {
            id: Uuid::new_v4(),
            source: error.pipeline.clone(),
            timestamp,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AnalysisResult::Failure { .. })
    }

    pub fn source(&self) -> &str {
        match self {
            AnalysisResult::Success { source, .. } => source,
            AnalysisResult::Failure { source, .. } => source,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            AnalysisResult::Success { id, .. } => *id,
            AnalysisResult::Failure { id, .. } => *id,
        }
    }

    /// Returns a copy tagged with the given fallback depth. Used by the
    /// orchestrator, which is the only component allowed to set this field
    /// (spec §8 glossary: "Fallback depth").
    pub fn with_fallback_depth(mut self, depth: u32) -> Self {
        if let AnalysisResult::Success { fallback_depth, .. } = &mut self {
            *fallback_depth = depth;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ErrorRecord};

    #[test]
    fn success_and_failure_are_mutually_exclusive() {
        let s = AnalysisResult::make_success("Pα", 0, 1.0, vec![], None, Value::Null);
        assert!(s.is_success() && !s.is_failure());

        let f = AnalysisResult::make_failure(
            ErrorRecord::new(ErrorKind::Unknown, "boom", "Pα", 0),
            0,
        );
        assert!(f.is_failure() && !f.is_success());
    }

    #[test]
    fn json_round_trip_preserves_equality() {
        let original = AnalysisResult::make_success("Pα", 42, 3.5, vec![], None, Value::Null)
            .with_fallback_depth(1);
        let json = serde_json::to_string(&original).unwrap();
        let restored: AnalysisResult = serde_json::from_str(&json).unwrap();
        match (&original, &restored) {
            (
                AnalysisResult::Success { id: a, fallback_depth: fa, .. },
                AnalysisResult::Success { id: b, fallback_depth: fb, .. },
            ) => {
                assert_eq!(a, b);
                assert_eq!(fa, fb);
            }
            _ => panic!("expected both to be Success"),
        }
    }
}
