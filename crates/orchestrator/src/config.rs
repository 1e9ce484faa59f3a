use std::time::Duration;
use synopticon_breaker::BreakerConfig;
use synopticon_strategy::StrategyKind;

/// Process-level orchestrator tunables. Defaults match spec §4.B/§4.E/§4.F
/// verbatim; nothing here is read from a config file (out of scope per
/// spec §1 — configuration loading is an external collaborator).
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub default_strategy: StrategyKind,
    pub default_timeout: Duration,
    pub max_fallbacks: u32,
    pub breaker: BreakerConfig,
    pub unregister_drain_timeout: Duration,
    /// Grace period after a deadline expires before a still-running
    /// pipeline call is detached (spec §5).
    pub cancel_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_strategy: StrategyKind::Balanced,
            default_timeout: Duration::from_millis(10_000),
            max_fallbacks: 2,
            breaker: BreakerConfig::default(),
            unregister_drain_timeout: Duration::from_secs(5),
            cancel_grace: Duration::from_millis(500),
        }
    }
}
