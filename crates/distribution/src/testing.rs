use crate::distributor::{Distributor, DistributorError, DistributorErrorKind, DistributorHealth};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use uuid::Uuid;

/// In-memory fake sink for session-manager tests: records every payload it
/// receives instead of touching the network, mirroring
/// `synopticon_pipeline::testing::ScriptedModule`.
#[derive(Default)]
pub struct RecordingDistributor {
    sent: Mutex<Vec<(Uuid, Vec<u8>)>>,
    connected: AtomicBool,
    fail_sends: AtomicBool,
    dropped: AtomicU64,
}

impl RecordingDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always_failing() -> Self {
        let d = Self::default();
        d.fail_sends.store(true, Ordering::SeqCst);
        d
    }

    pub fn sent(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Distributor for RecordingDistributor {
    async fn connect(&self) -> Result<(), DistributorError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, stream: Uuid, payload: &[u8]) -> Result<(), DistributorError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(DistributorError::new(DistributorErrorKind::SendFailed, "scripted failure"));
        }
        self.sent.lock().push((stream, payload.to_vec()));
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn health(&self) -> DistributorHealth {
        DistributorHealth {
            connected: self.connected.load(Ordering::SeqCst),
            queue_depth: self.sent.lock().len(),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
