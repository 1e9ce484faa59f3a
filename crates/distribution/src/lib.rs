//! Stream session management, per-transport distributors and adaptive
//! quality control (spec §4.F–§4.H). The orchestrator never talks to a
//! distributor directly: results flow through `StreamSessionManager::submit`,
//! which fans out to every matching stream's bounded, drop-oldest queue.

pub mod distributor;
pub mod http;
pub mod mqtt;
pub mod quality;
pub mod queue;
pub mod recording;
pub mod session;
pub mod sse;
pub mod testing;
pub mod udp;
pub mod websocket;

pub use distributor::{Distributor, DistributorError, DistributorErrorKind, DistributorHealth};
pub use quality::{NetworkStats, QualityController, QualityControllerConfig, QualityLevel};
pub use queue::DropOldestQueue;
pub use recording::RecordingSink;
pub use session::{
    DistributionStatus, DistributorStatus, SessionConfig, SessionError, StreamListFilter, StreamSessionManager,
};
