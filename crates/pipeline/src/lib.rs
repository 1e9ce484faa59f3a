//! The `Pipeline` contract (spec §4.C): a uniform async lifecycle wrapper
//! around an analysis module, tracking per-instance performance state.

pub mod frame;
pub mod module;
pub mod pipeline;
pub mod testing;

pub use frame::Frame;
pub use module::{AnalysisModule, ModuleError, ModuleErrorKind, ModuleOutput};
pub use pipeline::{Pipeline, PipelineHandle, PipelineStatus};
