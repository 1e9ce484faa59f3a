use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose3dof {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose6dof {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeState {
    Open,
    Closed,
    Squinting,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Disgusted,
    Fearful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

/// A single detected face. Fields absent from the source pipeline's
/// capability set are `None`, never a sentinel/zero value — the spec's
/// wording is explicit that "absent fields mean the producing pipeline
/// lacks that capability".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub bbox: BBox,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub landmarks: Option<Vec<Point2D>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pose_3dof: Option<Pose3dof>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pose_6dof: Option<Pose6dof>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub eye_state: Option<EyeState>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expression: Option<Expression>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub age: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gender: Option<Gender>,
}

/// Audio-derived results (speech recognition/analysis, audio quality).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioResult {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub speech_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sentiment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub audio_quality_score: Option<f64>,
}
