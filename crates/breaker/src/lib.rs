//! A single circuit-breaker implementation shared by the pipeline
//! orchestrator and every distributor's downstream-sink calls (spec §9
//! design notes: "one breaker library, one FSM ... used by orchestrator
//! AND distributors with the same semantics but separate instances").
//!
//! The breaker is pure state: it never sleeps, spawns a task, or reads the
//! wall clock itself. Callers pass in `Instant::now()` so the FSM stays
//! unit-testable without timing flakiness.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub probe_limit: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_millis(30_000),
            probe_limit: 1,
        }
    }
}

/// Per-pipeline (or per-sink) breaker state. `opened_at`/`half_open_successes`
/// are plain fields rather than atomics: the breaker is single-writer,
/// serialized through whatever lock its owner (orchestrator registry entry,
/// distributor) already holds around the call, matching spec §5's "compare-
/// and-swap semantics; no lock held across I/O" — the lock only ever guards
/// this small struct, never the call itself.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    status: BreakerStatus,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    half_open_successes: u32,
}

/// Whether a call may proceed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Reject,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            status: BreakerStatus::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_in_flight: 0,
            half_open_successes: 0,
        }
    }

    pub fn status(&self) -> BreakerStatus {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Call before attempting a pipeline/sink invocation. Transitions
    /// `open -> half_open` if the cooldown has elapsed (spec §4.B). Returns
    /// `Reject` if the breaker is `open` (cooldown not yet elapsed) or if
    /// `half_open` has already admitted `probe_limit` concurrent calls
    /// (spec I3).
    pub fn try_acquire(&mut self, now: Instant) -> Admission {
        match self.status {
            BreakerStatus::Closed => Admission::Allow,
            BreakerStatus::Open => {
                let elapsed = self
                    .opened_at
                    .map(|opened| now.saturating_duration_since(opened))
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.cooldown {
                    self.status = BreakerStatus::HalfOpen;
                    self.half_open_in_flight = 0;
                    self.half_open_successes = 0;
                    self.try_acquire(now)
                } else {
                    Admission::Reject
                }
            }
            BreakerStatus::HalfOpen => {
                if self.half_open_in_flight < self.config.probe_limit {
                    self.half_open_in_flight += 1;
                    Admission::Allow
                } else {
                    Admission::Reject
                }
            }
        }
    }

    /// Records a successful call outcome. In `closed`, resets the
    /// consecutive-failure counter. In `half_open`, one success closes the
    /// breaker and resets all counters (spec §4.B).
    pub fn on_success(&mut self) {
        match self.status {
            BreakerStatus::Closed => {
                self.consecutive_failures = 0;
            }
            BreakerStatus::HalfOpen => {
                self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
                self.half_open_successes += 1;
                self.status = BreakerStatus::Closed;
                self.consecutive_failures = 0;
                self.opened_at = None;
                self.half_open_in_flight = 0;
                self.half_open_successes = 0;
            }
            BreakerStatus::Open => {
                // A success should never be reported while rejecting calls;
                // defensively ignore rather than corrupt state.
            }
        }
    }

    /// Records a failed call outcome, transitioning to `open` when the
    /// failure threshold is reached (spec I2), or immediately re-opening a
    /// `half_open` probe that failed.
    pub fn on_failure(&mut self, now: Instant) {
        match self.status {
            BreakerStatus::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.status = BreakerStatus::Open;
                    self.opened_at = Some(now);
                }
            }
            BreakerStatus::HalfOpen => {
                self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
                self.status = BreakerStatus::Open;
                self.opened_at = Some(now);
                self.half_open_successes = 0;
            }
            BreakerStatus::Open => {
                // Already open; nothing to update.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 5,
            cooldown: Duration::from_millis(100),
            probe_limit: 1,
        }
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let mut breaker = CircuitBreaker::new(cfg());
        let t0 = Instant::now();
        for _ in 0..4 {
            assert_eq!(breaker.try_acquire(t0), Admission::Allow);
            breaker.on_failure(t0);
        }
        assert_eq!(breaker.status(), BreakerStatus::Closed);
        assert_eq!(breaker.try_acquire(t0), Admission::Allow);
        breaker.on_failure(t0);
        assert_eq!(breaker.status(), BreakerStatus::Open);
        // I2: the next call is rejected before ever reaching the pipeline.
        assert_eq!(breaker.try_acquire(t0), Admission::Reject);
    }

    #[test]
    fn success_resets_consecutive_failures_in_closed() {
        let mut breaker = CircuitBreaker::new(cfg());
        let t0 = Instant::now();
        breaker.on_failure(t0);
        breaker.on_failure(t0);
        breaker.on_success();
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn half_open_probe_limit_is_respected() {
        let mut breaker = CircuitBreaker::new(cfg());
        let t0 = Instant::now();
        for _ in 0..5 {
            breaker.on_failure(t0);
        }
        assert_eq!(breaker.status(), BreakerStatus::Open);
        let t1 = t0 + Duration::from_millis(150);
        assert_eq!(breaker.try_acquire(t1), Admission::Allow);
        assert_eq!(breaker.status(), BreakerStatus::HalfOpen);
        // I3: a second concurrent probe is rejected.
        assert_eq!(breaker.try_acquire(t1), Admission::Reject);
    }

    #[test]
    fn half_open_success_closes_and_failure_reopens() {
        let mut breaker = CircuitBreaker::new(cfg());
        let t0 = Instant::now();
        for _ in 0..5 {
            breaker.on_failure(t0);
        }
        let t1 = t0 + Duration::from_millis(150);
        let _ = breaker.try_acquire(t1);
        breaker.on_success();
        assert_eq!(breaker.status(), BreakerStatus::Closed);

        for _ in 0..5 {
            breaker.on_failure(t0);
        }
        let t2 = t0 + Duration::from_millis(300);
        let _ = breaker.try_acquire(t2);
        breaker.on_failure(t2);
        assert_eq!(breaker.status(), BreakerStatus::Open);
    }
}
