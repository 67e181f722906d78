//! Server configuration from environment variables.

use nexo_core::{defaults, Error, Result};

/// Top-level server configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `DATABASE_URL` | (required) | PostgreSQL connection string |
/// | `NEXO_PORT` | `8080` | HTTP listen port |
/// | `NEXO_RESULTS_DIR` | `results` | Root of the per-kind artifact tree |
/// | `NEXO_STORE_VERSION` | `dev` | Store version stamped into graph fingerprints |
/// | `NEXO_TOOL_TIMEOUT_SECS` | `3600` | External tool timeout |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    pub results_dir: String,
    pub store_version: String,
    pub tool_timeout_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL is not set".to_string()))?;

        let port = match std::env::var("NEXO_PORT") {
            Err(_) => defaults::SERVER_PORT,
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("Invalid NEXO_PORT: {raw:?}")))?,
        };

        let tool_timeout_secs = match std::env::var("NEXO_TOOL_TIMEOUT_SECS") {
            Err(_) => defaults::TOOL_TIMEOUT_SECS,
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("Invalid NEXO_TOOL_TIMEOUT_SECS: {raw:?}")))?,
        };

        Ok(Self {
            database_url,
            port,
            results_dir: std::env::var("NEXO_RESULTS_DIR")
                .unwrap_or_else(|_| "results".to_string()),
            store_version: std::env::var("NEXO_STORE_VERSION")
                .unwrap_or_else(|_| "dev".to_string()),
            tool_timeout_secs,
        })
    }
}
