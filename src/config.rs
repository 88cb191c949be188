//! Server configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    8484
}

fn default_request_timeout_ms() -> u64 {
    3000
}

/// Default database location: `<config dir>/logspyq/logspyq.db`.
#[must_use]
pub fn default_db_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("logspyq")
        .join("logspyq.db")
}

/// Configuration parsed from an optional `config.toml`.
///
/// Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Interface the HTTP server binds.
    #[serde(default = "default_host")]
    pub host: String,
    /// HTTP port for the admin surface and the WebSocket endpoint.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port of the newline-delimited TCP endpoint; disabled when absent.
    #[serde(default)]
    pub tcp_port: Option<u16>,
    /// Verbose logging.
    #[serde(default)]
    pub debug: bool,
    /// `SQLite` database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Default deadline for host requests.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Catalog allow-list for multi-agent mode; empty loads every agent.
    #[serde(default)]
    pub agents: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tcp_port: None,
            debug: false,
            db_path: default_db_path(),
            request_timeout_ms: default_request_timeout_ms(),
            agents: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Request deadline as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(AppError::Config("host must not be empty".into()));
        }

        if self.request_timeout_ms == 0 {
            return Err(AppError::Config(
                "request_timeout_ms must be greater than zero".into(),
            ));
        }

        if let Some(tcp_port) = self.tcp_port {
            if tcp_port != 0 && tcp_port == self.port {
                return Err(AppError::Config(format!(
                    "tcp_port {tcp_port} collides with the http port"
                )));
            }
        }

        if self.agents.iter().any(|name| name.trim().is_empty()) {
            return Err(AppError::Config("agent names must not be empty".into()));
        }

        Ok(())
    }
}
