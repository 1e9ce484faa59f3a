use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Smoothing factor from spec §4.H ("Exponential smoothing α=0.3"). Kept
/// distinct from `synopticon_types::state::EWMA_ALPHA` (0.2), which smooths
/// pipeline latency/fps, not network stats.
const QUALITY_EWMA_ALPHA: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Mobile,
    Low,
    Medium,
    High,
    Ultra,
}

impl QualityLevel {
    /// Descending order, matching spec §4.H ("ultra > high > medium > low >
    /// mobile").
    pub const DESCENDING: &'static [QualityLevel] =
        &[QualityLevel::Ultra, QualityLevel::High, QualityLevel::Medium, QualityLevel::Low, QualityLevel::Mobile];

    pub fn min_bandwidth_bps(&self) -> f64 {
        match self {
            QualityLevel::Ultra => 8_000_000.0,
            QualityLevel::High => 4_000_000.0,
            QualityLevel::Medium => 1_500_000.0,
            QualityLevel::Low => 500_000.0,
            QualityLevel::Mobile => 150_000.0,
        }
    }

    /// Target capture frame rate for this level. Shared by the quality
    /// controller (distribution side) and the media streaming pipeline
    /// (producer side, spec §4.J) — SPEC_FULL.md §11 resolves the source's
    /// two divergent quality-profile tables into this one.
    pub fn target_fps(&self) -> u32 {
        match self {
            QualityLevel::Ultra => 60,
            QualityLevel::High => 30,
            QualityLevel::Medium => 24,
            QualityLevel::Low => 15,
            QualityLevel::Mobile => 10,
        }
    }

    fn step_down(&self) -> Option<QualityLevel> {
        let idx = Self::DESCENDING.iter().position(|l| l == self)?;
        Self::DESCENDING.get(idx + 1).copied()
    }

    fn step_up(&self) -> Option<QualityLevel> {
        let idx = Self::DESCENDING.iter().position(|l| l == self)?;
        idx.checked_sub(1).and_then(|i| Self::DESCENDING.get(i).copied())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NetworkStats {
    pub bandwidth_bps: f64,
    pub latency_ms: f64,
    pub packet_loss: f64,
    pub jitter_ms: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct QualityControllerConfig {
    pub interval: Duration,
    pub cooldown: Duration,
}

impl Default for QualityControllerConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(5), cooldown: Duration::from_secs(3) }
    }
}

/// Adaptive per-stream quality selector (spec §4.H). Pure state: the caller
/// supplies both the raw sample and `now`, same discipline as
/// `synopticon_breaker::CircuitBreaker`.
pub struct QualityController {
    config: QualityControllerConfig,
    level: QualityLevel,
    smoothed: NetworkStats,
    last_sample_at: Option<Instant>,
    last_change_at: Option<Instant>,
}

impl QualityController {
    pub fn new(config: QualityControllerConfig, initial: QualityLevel) -> Self {
        Self { config, level: initial, smoothed: NetworkStats::default(), last_sample_at: None, last_change_at: None }
    }

    pub fn level(&self) -> QualityLevel {
        self.level
    }

    fn smooth(previous: f64, sample: f64) -> f64 {
        QUALITY_EWMA_ALPHA * sample + (1.0 - QUALITY_EWMA_ALPHA) * previous
    }

    /// Feeds one raw sample. Returns `Some(new_level)` if this tick changed
    /// the quality level, per the rule ladder in spec §4.H. Evaluates at
    /// most once per `config.interval` and never twice inside
    /// `config.cooldown` of the previous change.
    pub fn observe(&mut self, sample: NetworkStats, now: Instant) -> Option<QualityLevel> {
        self.smoothed = NetworkStats {
            bandwidth_bps: Self::smooth(self.smoothed.bandwidth_bps, sample.bandwidth_bps),
            latency_ms: Self::smooth(self.smoothed.latency_ms, sample.latency_ms),
            packet_loss: Self::smooth(self.smoothed.packet_loss, sample.packet_loss),
            jitter_ms: Self::smooth(self.smoothed.jitter_ms, sample.jitter_ms),
        };

        let due = self.last_sample_at.map(|t| now.saturating_duration_since(t) >= self.config.interval).unwrap_or(true);
        if !due {
            return None;
        }
        self.last_sample_at = Some(now);

        if let Some(changed_at) = self.last_change_at {
            if now.saturating_duration_since(changed_at) < self.config.cooldown {
                return None;
            }
        }

        let degraded = self.smoothed.latency_ms > 200.0 || self.smoothed.packet_loss > 0.02;
        let bandwidth_floor = self.smoothed.bandwidth_bps * 0.8;

        let target = if degraded || bandwidth_floor < self.level.min_bandwidth_bps() {
            self.level.step_down()
        } else if let Some(next_up) = self.level.step_up() {
            if bandwidth_floor > next_up.min_bandwidth_bps() * 1.5 {
                Some(next_up)
            } else {
                None
            }
        } else {
            None
        };

        match target {
            Some(new_level) if new_level != self.level => {
                self.level = new_level;
                self.last_change_at = Some(now);
                Some(new_level)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(bandwidth_bps: f64) -> NetworkStats {
        NetworkStats { bandwidth_bps, latency_ms: 20.0, packet_loss: 0.0, jitter_ms: 1.0 }
    }

    #[test]
    fn steps_down_when_bandwidth_drops_below_current_floor() {
        let mut controller = QualityController::new(
            QualityControllerConfig { interval: Duration::ZERO, cooldown: Duration::ZERO },
            QualityLevel::High,
        );
        let t0 = Instant::now();
        // Drive the EWMA down across several ticks so the smoothed value,
        // not just one raw sample, crosses the floor. The level ratchets
        // down one step per tick until it bottoms out at `mobile`.
        let mut any_change = false;
        for i in 0..10 {
            any_change |= controller.observe(stats(100_000.0), t0 + Duration::from_millis(i)).is_some();
        }
        assert_eq!(controller.level(), QualityLevel::Mobile);
        assert!(any_change);
    }

    #[test]
    fn never_skips_more_than_one_level_per_tick() {
        let mut controller = QualityController::new(
            QualityControllerConfig { interval: Duration::ZERO, cooldown: Duration::ZERO },
            QualityLevel::Ultra,
        );
        let t0 = Instant::now();
        let before = controller.level();
        let changed = controller.observe(stats(1_000.0), t0);
        if let Some(new_level) = changed {
            let before_idx = QualityLevel::DESCENDING.iter().position(|l| *l == before).unwrap();
            let after_idx = QualityLevel::DESCENDING.iter().position(|l| l == &new_level).unwrap();
            assert_eq!(after_idx, before_idx + 1);
        }
    }

    #[test]
    fn high_latency_steps_down_even_with_healthy_bandwidth() {
        let mut controller = QualityController::new(
            QualityControllerConfig { interval: Duration::ZERO, cooldown: Duration::ZERO },
            QualityLevel::High,
        );
        let t0 = Instant::now();
        // Warm the EWMA up on abundant, healthy bandwidth until the level
        // stabilizes (it ratchets up to `ultra` and stays there, since
        // `ultra` has no level above it to step to).
        let healthy = stats(50_000_000.0);
        for i in 0..50 {
            let _ = controller.observe(healthy, t0 + Duration::from_millis(i));
        }
        let before = controller.level();

        let degraded = NetworkStats { bandwidth_bps: 50_000_000.0, latency_ms: 500.0, packet_loss: 0.0, jitter_ms: 1.0 };
        let changed = controller.observe(degraded, t0 + Duration::from_millis(60));

        let before_idx = QualityLevel::DESCENDING.iter().position(|l| *l == before).unwrap();
        match changed {
            Some(new_level) => {
                let after_idx = QualityLevel::DESCENDING.iter().position(|l| l == &new_level).unwrap();
                assert_eq!(after_idx, before_idx + 1, "high latency must step down exactly one level");
            }
            None => panic!("expected high latency to force a step down from {before:?}"),
        }
    }

    #[test]
    fn respects_cooldown_between_changes() {
        let mut controller = QualityController::new(
            QualityControllerConfig { interval: Duration::ZERO, cooldown: Duration::from_secs(3) },
            QualityLevel::High,
        );
        let t0 = Instant::now();
        let low = stats(1_000.0);
        let first = controller.observe(low, t0);
        assert!(first.is_some());
        let second = controller.observe(low, t0 + Duration::from_millis(10));
        assert_eq!(second, None, "a second step-down inside the cooldown window must be suppressed");
    }
}
