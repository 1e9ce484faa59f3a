use serde::{Deserialize, Serialize};

/// Mutable per-instance snapshot of a pipeline's runtime health. The owning
/// `Pipeline` wrapper holds this behind a single-writer discipline (spec
/// §3 Ownership); this struct itself carries no synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub initialized: bool,
    pub healthy: bool,
    pub frames_processed: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub last_latency_ms: f64,
    pub ewma_latency_ms: f64,
    pub current_fps: f64,
    pub last_frame_ts: i64,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            initialized: false,
            healthy: false,
            frames_processed: 0,
            success_count: 0,
            error_count: 0,
            last_latency_ms: 0.0,
            ewma_latency_ms: 0.0,
            current_fps: 0.0,
            last_frame_ts: 0,
        }
    }
}

/// EWMA smoothing factor mandated by spec §4.C.
pub const EWMA_ALPHA: f64 = 0.2;

/// Error-rate threshold below which a pipeline is considered healthy,
/// mandated by spec §3/§4.C.
pub const UNHEALTHY_ERROR_RATE: f64 = 0.1;

impl PipelineState {
    /// Recomputes `healthy` per spec §4.C:
    /// `healthy ⇔ initialized ∧ (frames_processed == 0 ∨ error_rate < 0.1)`.
    pub fn recompute_health(&mut self) {
        let error_rate = if self.frames_processed == 0 {
            0.0
        } else {
            self.error_count as f64 / self.frames_processed as f64
        };
        self.healthy = self.initialized && (self.frames_processed == 0 || error_rate < UNHEALTHY_ERROR_RATE);
    }

    /// Records one successful `process` call, updating counters, EWMA
    /// latency and instantaneous fps.
    pub fn record_success(&mut self, latency_ms: f64, now_ts: i64) {
        self.frames_processed += 1;
        self.success_count += 1;
        self.apply_latency(latency_ms, now_ts);
        self.recompute_health();
    }

    /// Records one failed `process` call. Still counted toward
    /// `frames_processed`/`error_count`/latency per spec's invariant
    /// `success_count + error_count == frames_processed`.
    pub fn record_failure(&mut self, latency_ms: f64, now_ts: i64) {
        self.frames_processed += 1;
        self.error_count += 1;
        self.apply_latency(latency_ms, now_ts);
        self.recompute_health();
    }

    fn apply_latency(&mut self, latency_ms: f64, now_ts: i64) {
        self.last_latency_ms = latency_ms;
        self.ewma_latency_ms = if self.frames_processed <= 1 {
            latency_ms
        } else {
            EWMA_ALPHA * latency_ms + (1.0 - EWMA_ALPHA) * self.ewma_latency_ms
        };
        if self.last_frame_ts > 0 {
            let delta_ms = (now_ts - self.last_frame_ts).max(1) as f64;
            let instantaneous_fps = 1000.0 / delta_ms;
            self.current_fps = EWMA_ALPHA * instantaneous_fps + (1.0 - EWMA_ALPHA) * self.current_fps;
        }
        self.last_frame_ts = now_ts;
    }

    /// Checks the invariant `success_count + error_count == frames_processed`
    /// (spec I1). Exposed for tests and assertions at crate boundaries.
    pub fn invariant_holds(&self) -> bool {
        self.success_count + self.error_count == self.frames_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_holds_after_mixed_outcomes() {
        let mut state = PipelineState::default();
        state.initialized = true;
        state.record_success(10.0, 1_000);
        state.record_failure(20.0, 1_100);
        state.record_success(5.0, 1_200);
        assert!(state.invariant_holds());
        assert_eq!(state.frames_processed, 3);
    }

    #[test]
    fn healthy_requires_initialization() {
        let mut state = PipelineState::default();
        state.record_success(1.0, 1);
        assert!(!state.healthy, "uninitialized pipelines are never healthy");
    }

    #[test]
    fn unhealthy_at_ten_percent_error_rate() {
        let mut state = PipelineState::default();
        state.initialized = true;
        for _ in 0..18 {
            state.record_success(1.0, 1);
        }
        state.record_failure(1.0, 2);
        // 18/19 success -> error rate ~5.3%, still healthy.
        assert!(state.healthy);
        state.record_failure(1.0, 3);
        // 18 success / 20 frames -> exactly 10% error rate; spec uses a
        // strict `<` comparison so this is unhealthy.
        assert!(!state.healthy, "exactly 10% error rate must be unhealthy (< not <=)");
    }
}
