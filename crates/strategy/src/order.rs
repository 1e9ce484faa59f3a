use crate::candidate::Candidate;
use crate::request::{Request, StrategyKind};
use synopticon_types::covers;

/// Filters out pipelines whose breaker is open, whose health is false, or
/// whose capabilities don't cover the request's required set — the common
/// pre-filter every built-in strategy applies before ordering (spec §4.D).
pub fn filter_candidates(request: &Request, candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| !c.breaker_open)
        .filter(|c| c.healthy)
        .filter(|c| covers(&c.descriptor.capabilities, &request.required_capabilities))
        .collect()
}

fn norm(value: f64, max: f64) -> f64 {
    if max <= 0.0 {
        0.0
    } else {
        (value / max).clamp(0.0, 1.0)
    }
}

/// Orders already-filtered candidates per `request.strategy` (spec §4.D).
/// Ties always resolve by pipeline name ascending, keeping the whole
/// pipeline deterministic end to end.
pub fn order_candidates(request: &Request, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    if request.strategy == StrategyKind::Hybrid {
        if let Some(floor) = request.performance_floor {
            candidates.retain(|c| floor.satisfied_by(&c.descriptor));
        }
    }

    match request.strategy {
        StrategyKind::PerformanceFirst => {
            candidates.sort_by(|a, b| {
                b.descriptor
                    .performance
                    .fps
                    .cmp(&a.descriptor.performance.fps)
                    .then(a.descriptor.performance.latency_ms.cmp(&b.descriptor.performance.latency_ms))
                    .then(a.descriptor.performance.cpu.rank().cmp(&b.descriptor.performance.cpu.rank()))
                    .then_with(|| a.name().cmp(b.name()))
            });
        }
        StrategyKind::AccuracyFirst | StrategyKind::Hybrid => {
            candidates.sort_by(|a, b| {
                let a_cov = a.descriptor.capabilities.len();
                let b_cov = b.descriptor.capabilities.len();
                // Prefer larger models (inverted model-size rank: bigger is
                // "more accurate" per spec §4.D).
                b_cov
                    .cmp(&a_cov)
                    .then(
                        b.descriptor
                            .performance
                            .model_size_mb
                            .partial_cmp(&a.descriptor.performance.model_size_mb)
                            .unwrap_or(std::cmp::Ordering::Equal),
                    )
                    .then_with(|| a.name().cmp(b.name()))
            });
        }
        StrategyKind::BatteryOptimized => {
            candidates.sort_by(|a, b| {
                a.descriptor
                    .performance
                    .battery
                    .rank()
                    .cmp(&b.descriptor.performance.battery.rank())
                    .then(a.descriptor.performance.cpu.rank().cmp(&b.descriptor.performance.cpu.rank()))
                    .then(a.descriptor.performance.memory.rank().cmp(&b.descriptor.performance.memory.rank()))
                    .then_with(|| a.name().cmp(b.name()))
            });
        }
        StrategyKind::Balanced => {
            let max_fps = candidates
                .iter()
                .map(|c| c.descriptor.performance.fps as f64)
                .fold(0.0_f64, f64::max);
            let max_inv_latency = candidates
                .iter()
                .map(|c| 1.0 / (c.descriptor.performance.latency_ms.max(1) as f64))
                .fold(0.0_f64, f64::max);
            let score = |c: &Candidate| -> f64 {
                let fps_n = norm(c.descriptor.performance.fps as f64, max_fps);
                let inv_lat_n = norm(1.0 / (c.descriptor.performance.latency_ms.max(1) as f64), max_inv_latency);
                let cpu_rank_n = c.descriptor.performance.cpu.rank() as f64 / 2.0;
                0.4 * fps_n + 0.4 * inv_lat_n + 0.2 * (1.0 - cpu_rank_n)
            };
            candidates.sort_by(|a, b| {
                score(b)
                    .partial_cmp(&score(a))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.name().cmp(b.name()))
            });
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use synopticon_types::{Capability, Impact, PerformanceProfile, PipelineDescriptor};

    fn candidate(name: &str, fps: u32, latency_ms: u32, cpu: Impact) -> Candidate {
        let mut caps = BTreeSet::new();
        let _ = caps.insert(Capability::FaceDetection);
        Candidate {
            descriptor: PipelineDescriptor::new(
                name,
                "1.0.0",
                caps,
                PerformanceProfile {
                    fps,
                    latency_ms,
                    cpu,
                    memory: Impact::Low,
                    battery: Impact::Low,
                    model_size_mb: 10.0,
                },
            ),
            healthy: true,
            breaker_open: false,
        }
    }

    fn request(strategy: StrategyKind) -> Request {
        let mut caps = BTreeSet::new();
        let _ = caps.insert(Capability::FaceDetection);
        Request { required_capabilities: caps, strategy, performance_floor: None }
    }

    #[test]
    fn performance_first_prefers_higher_fps() {
        let candidates = vec![candidate("Pslow", 15, 40, Impact::Low), candidate("Pfast", 30, 20, Impact::Low)];
        let ordered = order_candidates(&request(StrategyKind::PerformanceFirst), candidates);
        assert_eq!(ordered[0].name(), "Pfast");
    }

    #[test]
    fn ties_break_on_name_ascending() {
        let candidates = vec![candidate("Pz", 30, 20, Impact::Low), candidate("Pa", 30, 20, Impact::Low)];
        let ordered = order_candidates(&request(StrategyKind::PerformanceFirst), candidates);
        assert_eq!(ordered[0].name(), "Pa");
    }

    #[test]
    fn filter_excludes_open_breaker_and_unhealthy() {
        let mut open = candidate("Popen", 30, 20, Impact::Low);
        open.breaker_open = true;
        let mut unhealthy = candidate("Punhealthy", 30, 20, Impact::Low);
        unhealthy.healthy = false;
        let ok = candidate("Pok", 30, 20, Impact::Low);
        let filtered = filter_candidates(&request(StrategyKind::Balanced), vec![open, unhealthy, ok]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name(), "Pok");
    }

    #[test]
    fn filter_excludes_pipelines_missing_required_capability() {
        let mut caps = BTreeSet::new();
        let _ = caps.insert(Capability::EyeTracking);
        let mut missing = candidate("Pmissing", 30, 20, Impact::Low);
        missing.descriptor.capabilities = caps;
        let filtered = filter_candidates(&request(StrategyKind::Balanced), vec![missing]);
        assert!(filtered.is_empty());
    }
}
