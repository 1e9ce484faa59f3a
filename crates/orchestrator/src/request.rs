use std::time::Duration;
use synopticon_pipeline::Frame;
use synopticon_strategy::{PerformanceFloor, StrategyKind};
use synopticon_types::CapabilitySet;

/// A dispatch request to `Orchestrator::process` (spec §4.E).
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub capabilities: CapabilitySet,
    pub strategy: Option<StrategyKind>,
    pub timeout: Option<Duration>,
    pub performance_floor: Option<PerformanceFloor>,
    pub frame: Frame,
    /// Bypasses capability-based candidate selection and fallback
    /// ordering to call exactly one named pipeline directly. Used for
    /// pipelines that aren't chosen by capability coverage at all — e.g.
    /// the media streaming producer (spec §4.J), whose `process` input is
    /// a `{action, parameters}` command rather than an analysis request.
    pub target_pipeline: Option<String>,
}

impl ProcessRequest {
    pub fn new(capabilities: CapabilitySet, frame: Frame) -> Self {
        Self { capabilities, strategy: None, timeout: None, performance_floor: None, frame, target_pipeline: None }
    }

    pub fn to_pipeline(name: impl Into<String>, frame: Frame) -> Self {
        Self {
            capabilities: CapabilitySet::new(),
            strategy: None,
            timeout: None,
            performance_floor: None,
            frame,
            target_pipeline: Some(name.into()),
        }
    }
}
