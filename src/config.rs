//! Configuration management for Gatekeeper.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{GatekeeperError, Result};

/// Environment variable overriding the admission window, in seconds.
pub const ENV_WINDOW: &str = "LIMIT_WINDOW";
/// Environment variable overriding the admission limit.
pub const ENV_LIMIT: &str = "LIMIT_COUNT";

/// Main configuration for the Gatekeeper service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Admission control configuration
    #[serde(default)]
    pub admission: AdmissionConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Path of the append-only audit log
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            audit_log_path: default_audit_log_path(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8000".parse().unwrap()
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("access_log.csv")
}

/// Admission control configuration. Fixed for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Trailing window over which requests are counted, in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Maximum admitted requests per client per window
    #[serde(default = "default_limit")]
    pub limit: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            limit: default_limit(),
        }
    }
}

fn default_window_secs() -> u64 {
    10
}

fn default_limit() -> u64 {
    50
}

impl AdmissionConfig {
    /// The admission window as a duration.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl GatekeeperConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: GatekeeperConfig = serde_yaml::from_str(&contents)
            .map_err(|e| GatekeeperError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from an optional file, then apply environment
    /// overrides. This is the startup entry point.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `LIMIT_WINDOW` / `LIMIT_COUNT` environment overrides.
    ///
    /// A malformed or negative value refuses startup.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(ENV_WINDOW) {
            self.admission.window_secs = parse_non_negative(ENV_WINDOW, &raw)?;
        }
        if let Ok(raw) = std::env::var(ENV_LIMIT) {
            self.admission.limit = parse_non_negative(ENV_LIMIT, &raw)?;
        }
        Ok(())
    }
}

/// Parse a non-negative integer setting, rejecting negatives and garbage.
fn parse_non_negative(name: &str, raw: &str) -> Result<u64> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| GatekeeperError::Config(format!("{} must be an integer, got {:?}", name, raw)))?;
    if value < 0 {
        return Err(GatekeeperError::Config(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    Ok(value as u64)
}
