//! Process-level settings. Spec §6 names exactly four environment
//! variables the core reads; this crate is the single place that does the
//! reading, following the teacher's plain-struct-populated-once-at-startup
//! settings style (`otap_df_config::engine::HttpAdminSettings`) rather than
//! a general config-file/CLI-flag loader, which is out of scope (spec §1).

use std::env;
use std::net::SocketAddr;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("PORT={0:?} is not a valid port number")]
    InvalidPort(String),
    #[error("failed to parse bind address: {0}")]
    InvalidBindAddress(#[from] std::net::AddrParseError),
}

/// Settings read once at startup and passed down by reference/`Arc`
/// (SPEC_FULL.md §10.3).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub api_key: Option<String>,
    pub log_level: String,
}

impl ServerConfig {
    /// Reads `PORT`, `ALLOWED_ORIGINS`, `API_KEY`, `LOG_LEVEL` (spec §6).
    /// Missing variables fall back to defaults; a present-but-unparsable
    /// `PORT` is an error (CLI entry exit code `1`, spec §6).
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            Err(_) => DEFAULT_PORT,
        };
        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let api_key = env::var("API_KEY").ok().filter(|s| !s.is_empty());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self { port, allowed_origins, api_key, log_level })
    }

    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        Ok(format!("0.0.0.0:{}", self.port).parse()?)
    }

    /// Whether `origin` is on the configured allow-list. An empty
    /// allow-list means "no origin restriction configured" — every origin
    /// is accepted, matching a development-friendly default.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == origin)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, allowed_origins: Vec::new(), api_key: None, log_level: "info".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allow_list_accepts_any_origin() {
        let config = ServerConfig::default();
        assert!(config.origin_allowed("https://anything.example"));
    }

    #[test]
    fn non_empty_allow_list_rejects_unknown_origins() {
        let config = ServerConfig { allowed_origins: vec!["https://ok.example".to_string()], ..ServerConfig::default() };
        assert!(config.origin_allowed("https://ok.example"));
        assert!(!config.origin_allowed("https://evil.example"));
    }
}
