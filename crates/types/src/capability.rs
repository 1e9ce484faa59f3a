use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Closed set of analytical capabilities a pipeline may produce or a request
/// may require. Unlike the source's free-form string tags, unknown values
/// fail to parse at the input boundary rather than flowing through as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    FaceDetection,
    Pose3dof,
    Pose6dof,
    EyeTracking,
    GazeEstimation,
    ExpressionAnalysis,
    AgeEstimation,
    GenderDetection,
    Landmarks,
    IrisTracking,
    SpeechRecognition,
    SpeechAnalysis,
    AudioQuality,
}

impl Capability {
    pub const ALL: &'static [Capability] = &[
        Capability::FaceDetection,
        Capability::Pose3dof,
        Capability::Pose6dof,
        Capability::EyeTracking,
        Capability::GazeEstimation,
        Capability::ExpressionAnalysis,
        Capability::AgeEstimation,
        Capability::GenderDetection,
        Capability::Landmarks,
        Capability::IrisTracking,
        Capability::SpeechRecognition,
        Capability::SpeechAnalysis,
        Capability::AudioQuality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::FaceDetection => "face_detection",
            Capability::Pose3dof => "pose_3dof",
            Capability::Pose6dof => "pose_6dof",
            Capability::EyeTracking => "eye_tracking",
            Capability::GazeEstimation => "gaze_estimation",
            Capability::ExpressionAnalysis => "expression_analysis",
            Capability::AgeEstimation => "age_estimation",
            Capability::GenderDetection => "gender_detection",
            Capability::Landmarks => "landmarks",
            Capability::IrisTracking => "iris_tracking",
            Capability::SpeechRecognition => "speech_recognition",
            Capability::SpeechAnalysis => "speech_analysis",
            Capability::AudioQuality => "audio_quality",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, UnknownCapability> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == raw)
            .ok_or_else(|| UnknownCapability(raw.to_string()))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when an external caller supplies a capability tag this closed
/// enum does not recognize. Callers at the API boundary should map this to
/// an `input_validation` error record.
#[derive(Debug, thiserror::Error)]
#[error("unknown capability: {0}")]
pub struct UnknownCapability(pub String);

/// Ordered, deduplicated set of capabilities. Kept as a `BTreeSet` so that
/// coverage checks and display ordering are deterministic, matching the
/// spec's requirement that tie-breaks (strategy ordering, serialization) be
/// reproducible.
pub type CapabilitySet = BTreeSet<Capability>;

/// Returns true if `have` covers every capability in `need`.
pub fn covers(have: &CapabilitySet, need: &CapabilitySet) -> bool {
    need.is_subset(have)
}
