use crate::capability::CapabilitySet;
use crate::performance::PerformanceProfile;
use serde::{Deserialize, Serialize};

/// Immutable metadata about a registered pipeline. Descriptors never change
/// after registration (spec §3); replacing a pipeline means unregistering
/// the old descriptor and registering a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDescriptor {
    pub name: String,
    pub version: String,
    pub capabilities: CapabilitySet,
    pub performance: PerformanceProfile,
    /// Whether concurrent `process` calls against the same instance are
    /// permitted. Default `false`: a pipeline's `process` is serialized per
    /// instance unless it opts in (spec §5).
    #[serde(default)]
    pub reentrant: bool,
}

impl PipelineDescriptor {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        capabilities: CapabilitySet,
        performance: PerformanceProfile,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            capabilities,
            performance,
            reentrant: false,
        }
    }

    pub fn reentrant(mut self, value: bool) -> Self {
        self.reentrant = value;
        self
    }
}
