use synopticon_types::PipelineDescriptor;

/// A strategy's view of one registered pipeline. Strategies never see the
/// live `Pipeline` object — only this snapshot — so ordering stays a pure
/// function of data (spec §4.D: "A Strategy is a pure function").
#[derive(Debug, Clone)]
pub struct Candidate {
    pub descriptor: PipelineDescriptor,
    pub healthy: bool,
    pub breaker_open: bool,
}

impl Candidate {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// Optional minimum performance floor a request may impose (used by the
/// `hybrid` strategy, spec §4.D).
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceFloor {
    pub min_fps: Option<u32>,
    pub max_latency_ms: Option<u32>,
}

impl PerformanceFloor {
    pub fn satisfied_by(&self, descriptor: &PipelineDescriptor) -> bool {
        if let Some(min_fps) = self.min_fps {
            if descriptor.performance.fps < min_fps {
                return false;
            }
        }
        if let Some(max_latency) = self.max_latency_ms {
            if descriptor.performance.latency_ms > max_latency {
                return false;
            }
        }
        true
    }
}
