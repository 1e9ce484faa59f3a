use serde::Serialize;
use synopticon_pipeline::PipelineStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub pipelines: Vec<PipelineStatusDto>,
    pub overall: OverallHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatusDto {
    pub name: String,
    pub initialized: bool,
    pub healthy: bool,
    pub breaker_open: bool,
    pub last_latency_ms: f64,
    pub fps: f64,
}

impl From<(&PipelineStatus, bool)> for PipelineStatusDto {
    fn from((status, breaker_open): (&PipelineStatus, bool)) -> Self {
        Self {
            name: status.name.clone(),
            initialized: status.initialized,
            healthy: status.healthy,
            breaker_open,
            last_latency_ms: status.last_latency_ms,
            fps: status.fps,
        }
    }
}

/// Aggregates per-pipeline statuses into the `overall` bucket, per
/// SPEC_FULL.md §11's fixed thresholds (spec.md leaves this unspecified):
/// `healthy` if every pipeline is healthy; `unhealthy` if none are;
/// `degraded` otherwise.
pub fn aggregate(statuses: &[PipelineStatusDto]) -> OverallHealth {
    if statuses.is_empty() {
        return OverallHealth::Unhealthy;
    }
    let healthy_count = statuses.iter().filter(|s| s.healthy && !s.breaker_open).count();
    if healthy_count == statuses.len() {
        OverallHealth::Healthy
    } else if healthy_count == 0 {
        OverallHealth::Unhealthy
    } else {
        OverallHealth::Degraded
    }
}
