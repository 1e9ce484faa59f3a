use serde::{Deserialize, Serialize};
use std::fmt;

/// Relative resource impact. Parsed only from the three literal strings
/// below; suffixed or numeric encodings are rejected at the boundary per
/// spec §3 ("parsers must reject suffixed strings at input boundaries").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    /// Rank used for tie-breaking in strategies: lower is better.
    pub fn rank(&self) -> u8 {
        match self {
            Impact::Low => 0,
            Impact::Medium => 1,
            Impact::High => 2,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidPerformanceField> {
        match raw {
            "low" => Ok(Impact::Low),
            "medium" => Ok(Impact::Medium),
            "high" => Ok(Impact::High),
            other => Err(InvalidPerformanceField(other.to_string())),
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid performance field value: {0:?}")]
pub struct InvalidPerformanceField(pub String);

/// Declared performance characteristics of a pipeline. Units are fixed
/// (frames per second, milliseconds, megabytes); nothing here is parsed
/// from suffixed strings such as `"20ms"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceProfile {
    pub fps: u32,
    pub latency_ms: u32,
    pub cpu: Impact,
    pub memory: Impact,
    pub battery: Impact,
    pub model_size_mb: f64,
}

impl PerformanceProfile {
    /// Validates ranges: fps and latency must be representable as finite,
    /// non-negative, and `model_size_mb` must be finite and non-negative.
    pub fn validate(&self) -> Result<(), InvalidPerformanceField> {
        if !self.model_size_mb.is_finite() || self.model_size_mb < 0.0 {
            return Err(InvalidPerformanceField(format!(
                "model_size_mb out of range: {}",
                self.model_size_mb
            )));
        }
        Ok(())
    }
}
