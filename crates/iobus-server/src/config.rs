//! TOML-based server configuration.
//!
//! Values are resolved once at startup and treated as immutable thereafter.
//! Every field carries a serde default, so an empty or missing config file
//! yields the protocol-level defaults (TCP 9800, UDP 9801, 5 s keepalive,
//! 3× timeout multiplier).
//!
//! ```toml
//! bind_address = "0.0.0.0"
//! tcp_port = 9800
//! udp_port = 9801
//! keepalive_interval = 5
//! keepalive_timeout_multiplier = 3
//! log_level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use iobus_core::protocol::messages::{
    DEFAULT_TCP_PORT, DEFAULT_UDP_PORT, KEEPALIVE_INTERVAL_SECS, KEEPALIVE_TIMEOUT_MULTIPLIER,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Immutable server configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// IP address to bind both sockets to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port for the control channel.
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    /// UDP port for the data channel.
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
    /// Keepalive ping interval in seconds.
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u16,
    /// Missed-pong multiplier: a client is evicted after
    /// `keepalive_interval × multiplier` seconds without a pong.
    #[serde(default = "default_keepalive_timeout_multiplier")]
    pub keepalive_timeout_multiplier: u32,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_udp_port() -> u16 {
    DEFAULT_UDP_PORT
}

fn default_keepalive_interval() -> u16 {
    KEEPALIVE_INTERVAL_SECS
}

fn default_keepalive_timeout_multiplier() -> u32 {
    KEEPALIVE_TIMEOUT_MULTIPLIER
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            tcp_port: default_tcp_port(),
            udp_port: default_udp_port(),
            keepalive_interval: default_keepalive_interval(),
            keepalive_timeout_multiplier: default_keepalive_timeout_multiplier(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Loads the config from `path`, falling back to defaults if the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on unreadable or malformed files; a missing
    /// file is not an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Seconds of silence before a client is considered dead.
    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.keepalive_interval) * u64::from(self.keepalive_timeout_multiplier))
    }

    /// Human-readable summary for the startup log line.
    pub fn summary(&self) -> String {
        format!(
            "TCP={}:{}  UDP={}:{}  keepalive={}s  timeout={}s  log={}",
            self.bind_address,
            self.tcp_port,
            self.bind_address,
            self.udp_port,
            self.keepalive_interval,
            self.keepalive_timeout().as_secs(),
            self.log_level,
        )
    }
}
