//! `tracing`/`tracing-subscriber` wiring (SPEC_FULL.md §10.1). This is the
//! only crate in the workspace allowed to install a global subscriber;
//! every other crate only emits spans and events through `tracing`.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a JSON-formatted global subscriber, with `LOG_LEVEL` (spec §6)
/// as the default directive when `RUST_LOG` is not set. Call once from
/// `main`; calling it twice is a programmer error the second
/// `try_init` call surfaces rather than panics on.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = fmt().with_env_filter(filter).json().with_target(true).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("tracing subscriber already installed; ignoring later init() call");
    }
}
