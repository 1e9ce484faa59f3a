//! Deterministic fakes used across the workspace's test suites, mirroring
//! the teacher's `engine::testing` module of fake receivers/processors/
//! exporters.

use crate::frame::Frame;
use crate::module::{AnalysisModule, ModuleError, ModuleErrorKind, ModuleOutput};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use synopticon_types::{BBox, Face};

/// A module that fails its first `fail_times` calls (incrementing
/// `process_calls` regardless), then succeeds forever after, returning one
/// deterministic face. Used to exercise fallback and circuit-breaker
/// behavior (spec §8 scenarios 2-4).
pub struct ScriptedModule {
    fail_times: usize,
    calls_so_far: AtomicUsize,
    pub process_calls: AtomicUsize,
}

impl ScriptedModule {
    pub fn new(fail_times: usize) -> Self {
        Self {
            fail_times,
            calls_so_far: AtomicUsize::new(0),
            process_calls: AtomicUsize::new(0),
        }
    }

    pub fn always_ok() -> Self {
        Self::new(0)
    }

    pub fn always_fails() -> Self {
        Self::new(usize::MAX)
    }

    pub fn call_count(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisModule for ScriptedModule {
    async fn process(&self, _frame: &Frame) -> Result<ModuleOutput, ModuleError> {
        let _ = self.process_calls.fetch_add(1, Ordering::SeqCst);
        let attempt = self.calls_so_far.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_times {
            return Err(ModuleError::new(ModuleErrorKind::Other, "scripted failure"));
        }
        Ok(ModuleOutput {
            faces: vec![Face {
                bbox: BBox { x: 10.0, y: 10.0, width: 50.0, height: 50.0 },
                confidence: 0.9,
                landmarks: None,
                pose_3dof: None,
                pose_6dof: None,
                eye_state: None,
                expression: None,
                age: None,
                gender: None,
            }],
            audio: None,
            metadata: Value::Null,
        })
    }
}

/// A module whose `process` never returns, for exercising orchestrator
/// deadline/cancellation behavior.
pub struct HangingModule;

#[async_trait]
impl AnalysisModule for HangingModule {
    async fn process(&self, _frame: &Frame) -> Result<ModuleOutput, ModuleError> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}
