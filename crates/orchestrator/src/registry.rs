use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use synopticon_breaker::{BreakerConfig, CircuitBreaker};
use synopticon_pipeline::PipelineHandle;
use synopticon_types::PipelineDescriptor;
use tokio::sync::Mutex as AsyncMutex;

/// One registered pipeline: its immutable descriptor, its live handle, and
/// the circuit breaker the orchestrator exclusively owns for it (spec §3
/// Ownership). The breaker is behind an async mutex because dispatch holds
/// it only for the brief, non-blocking admission check/outcome update —
/// never across the pipeline's own `process` await (spec §5: "no lock held
/// across I/O").
pub struct RegisteredPipeline {
    pub handle: Arc<dyn PipelineHandle>,
    pub breaker: AsyncMutex<CircuitBreaker>,
    pub in_flight: AtomicUsize,
    pub draining: AtomicBool,
}

impl RegisteredPipeline {
    pub fn new(handle: Arc<dyn PipelineHandle>, breaker_config: BreakerConfig) -> Self {
        Self {
            handle,
            breaker: AsyncMutex::new(CircuitBreaker::new(breaker_config)),
            in_flight: AtomicUsize::new(0),
            draining: AtomicBool::new(false),
        }
    }

    pub fn descriptor(&self) -> &PipelineDescriptor {
        self.handle.descriptor()
    }

    pub fn accepting_calls(&self) -> bool {
        !self.draining.load(Ordering::SeqCst)
    }
}

/// Guard that decrements `in_flight` on drop, so a panicking or
/// early-returning dispatch never leaves the counter stuck (which would
/// block `unregister`'s drain forever).
pub struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    pub fn enter(counter: &'a AtomicUsize) -> Self {
        let _ = counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let _ = self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
