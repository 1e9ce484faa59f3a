use crate::candidate::PerformanceFloor;
use serde::{Deserialize, Serialize};
use synopticon_types::CapabilitySet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    PerformanceFirst,
    AccuracyFirst,
    BatteryOptimized,
    Balanced,
    Hybrid,
}

impl Default for StrategyKind {
    fn default() -> Self {
        StrategyKind::Balanced
    }
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::PerformanceFirst => "performance_first",
            StrategyKind::AccuracyFirst => "accuracy_first",
            StrategyKind::BatteryOptimized => "battery_optimized",
            StrategyKind::Balanced => "balanced",
            StrategyKind::Hybrid => "hybrid",
        }
    }

    pub const ALL: &'static [StrategyKind] = &[
        StrategyKind::PerformanceFirst,
        StrategyKind::AccuracyFirst,
        StrategyKind::BatteryOptimized,
        StrategyKind::Balanced,
        StrategyKind::Hybrid,
    ];
}

/// A dispatch request, the input every strategy orders candidates against.
#[derive(Debug, Clone)]
pub struct Request {
    pub required_capabilities: CapabilitySet,
    pub strategy: StrategyKind,
    pub performance_floor: Option<PerformanceFloor>,
}
