use crate::frame::Frame;
use crate::module::{AnalysisModule, ModuleErrorKind, ModuleOutput};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use synopticon_types::{now_ms, AnalysisResult, ErrorKind, ErrorRecord, PipelineDescriptor, PipelineState};
use tracing::{info_span, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    NotInitialized,
    Initialized,
    FailedInit,
    CleanedUp,
}

/// A point-in-time status projection, the payload of `get_status` (spec
/// §4.C).
#[derive(Debug, Clone)]
pub struct PipelineStatus {
    pub name: String,
    pub initialized: bool,
    pub healthy: bool,
    pub last_latency_ms: f64,
    pub fps: f64,
}

/// Object-safe facade the orchestrator holds over heterogeneous pipelines.
/// Implemented generically by `Pipeline<M>` below.
#[async_trait]
pub trait PipelineHandle: Send + Sync {
    fn descriptor(&self) -> &PipelineDescriptor;
    async fn initialize(&self, config: Value) -> Result<(), ErrorRecord>;
    async fn process(&self, frame: Frame) -> AnalysisResult;
    async fn cleanup(&self);
    fn get_status(&self) -> PipelineStatus;
    fn get_metrics(&self) -> PipelineState;
}

/// The uniform lifecycle wrapper around one `AnalysisModule` instance
/// (spec §4.C). Exclusively owns the module's `PipelineState` (spec §3
/// Ownership); the orchestrator never mutates it directly.
pub struct Pipeline<M: AnalysisModule> {
    descriptor: PipelineDescriptor,
    module: M,
    state: Mutex<PipelineState>,
    init_state: Mutex<InitState>,
    // Serializes `process` for non-reentrant pipelines. `None` when the
    // descriptor declares `reentrant: true`.
    process_lock: Option<tokio::sync::Mutex<()>>,
    initializing: AtomicBool,
}

impl<M: AnalysisModule> Pipeline<M> {
    pub fn new(descriptor: PipelineDescriptor, module: M) -> Self {
        let process_lock = if descriptor.reentrant {
            None
        } else {
            Some(tokio::sync::Mutex::new(()))
        };
        Self {
            descriptor,
            module,
            state: Mutex::new(PipelineState::default()),
            init_state: Mutex::new(InitState::NotInitialized),
            process_lock,
            initializing: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<M: AnalysisModule> PipelineHandle for Pipeline<M> {
    fn descriptor(&self) -> &PipelineDescriptor {
        &self.descriptor
    }

    async fn initialize(&self, config: Value) -> Result<(), ErrorRecord> {
        {
            let guard = self.init_state.lock();
            if *guard == InitState::Initialized {
                // Idempotent re-initialization: ok without side effects.
                return Ok(());
            }
        }
        if self
            .initializing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Another caller is already initializing; treat as success once
            // it lands, matching "idempotent" intent without double-firing
            // the module's side effects.
            return Ok(());
        }
        let result = self.module.initialize(&config).await;
        self.initializing.store(false, Ordering::SeqCst);
        match result {
            Ok(()) => {
                *self.init_state.lock() = InitState::Initialized;
                let mut state = self.state.lock();
                state.initialized = true;
                state.recompute_health();
                Ok(())
            }
            Err(err) => {
                *self.init_state.lock() = InitState::FailedInit;
                Err(ErrorRecord::new(
                    ErrorKind::Initialization,
                    err.message,
                    self.descriptor.name.clone(),
                    now_ms(),
                ))
            }
        }
    }

    async fn process(&self, frame: Frame) -> AnalysisResult {
        let ts = now_ms();
        {
            let guard = self.init_state.lock();
            if *guard != InitState::Initialized {
                // process before initialize, after cleanup, or after a
                // failed initialize: always `initialization` failure, and
                // per spec, counters are not incremented in this case.
                return AnalysisResult::make_failure(
                    ErrorRecord::new(
                        ErrorKind::Initialization,
                        "pipeline is not initialized",
                        self.descriptor.name.clone(),
                        ts,
                    ),
                    ts,
                );
            }
        }

        let _serialize_guard = match &self.process_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let span = info_span!("pipeline_process", pipeline = %self.descriptor.name);
        let start = Instant::now();
        let outcome = self.module.process(&frame).instrument(span).await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(ModuleOutput { faces, audio, metadata }) => {
                {
                    let mut state = self.state.lock();
                    state.record_success(latency_ms, ts);
                }
                AnalysisResult::make_success(self.descriptor.name.clone(), ts, latency_ms, faces, audio, metadata)
            }
            Err(err) => {
                {
                    let mut state = self.state.lock();
                    state.record_failure(latency_ms, ts);
                }
                let kind = match err.kind {
                    ModuleErrorKind::Initialization => ErrorKind::Initialization,
                    ModuleErrorKind::ModelUnavailable => ErrorKind::ModelUnavailable,
                    ModuleErrorKind::ResourceExhausted => ErrorKind::ResourceExhausted,
                    ModuleErrorKind::Other => ErrorKind::Unknown,
                };
                AnalysisResult::make_failure(
                    ErrorRecord::new(kind, err.message, self.descriptor.name.clone(), ts),
                    ts,
                )
            }
        }
    }

    async fn cleanup(&self) {
        self.module.cleanup().await;
        *self.init_state.lock() = InitState::CleanedUp;
        let mut state = self.state.lock();
        state.initialized = false;
        state.recompute_health();
    }

    fn get_status(&self) -> PipelineStatus {
        let state = self.state.lock();
        PipelineStatus {
            name: self.descriptor.name.clone(),
            initialized: state.initialized,
            healthy: state.healthy,
            last_latency_ms: state.last_latency_ms,
            fps: state.current_fps,
        }
    }

    fn get_metrics(&self) -> PipelineState {
        *self.state.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleError;
    use std::collections::BTreeSet;
    use synopticon_types::{Capability, Impact, PerformanceProfile};

    struct AlwaysOk;
    #[async_trait]
    impl AnalysisModule for AlwaysOk {
        async fn process(&self, _frame: &Frame) -> Result<ModuleOutput, ModuleError> {
            Ok(ModuleOutput::default())
        }
    }

    fn descriptor() -> PipelineDescriptor {
        let mut caps = BTreeSet::new();
        let _ = caps.insert(Capability::FaceDetection);
        PipelineDescriptor::new(
            "Pα",
            "1.0.0",
            caps,
            PerformanceProfile {
                fps: 30,
                latency_ms: 20,
                cpu: Impact::Low,
                memory: Impact::Low,
                battery: Impact::Low,
                model_size_mb: 1.0,
            },
        )
    }

    fn frame() -> Frame {
        Frame::new("cam0", 1, vec![], BTreeSet::new())
    }

    #[tokio::test]
    async fn process_before_initialize_fails_without_counting() {
        let pipeline = Pipeline::new(descriptor(), AlwaysOk);
        let result = pipeline.process(frame()).await;
        assert!(result.is_failure());
        assert_eq!(pipeline.get_metrics().frames_processed, 0);
    }

    #[tokio::test]
    async fn reinitializing_is_idempotent() {
        let pipeline = Pipeline::new(descriptor(), AlwaysOk);
        pipeline.initialize(Value::Null).await.unwrap();
        pipeline.initialize(Value::Null).await.unwrap();
        assert!(pipeline.get_status().initialized);
    }

    #[tokio::test]
    async fn process_after_cleanup_fails() {
        let pipeline = Pipeline::new(descriptor(), AlwaysOk);
        pipeline.initialize(Value::Null).await.unwrap();
        pipeline.cleanup().await;
        let result = pipeline.process(frame()).await;
        assert!(result.is_failure());
    }
}
