//! # Sniffer Configuration
//!
//! Settings for one capture session, loadable from a JSON document. Every
//! field has a default, so `{}` is a valid configuration.
//!
//! ```json
//! {
//!   "port": 2181,
//!   "max_outstanding_requests": 100000,
//!   "capture_file": "/var/tmp/zk.pcap"
//! }
//! ```
//!
//! A live session names an `interface` instead of a `capture_file`, and may
//! override the BPF `filter` installed on it (default `port <port>`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::decoder::DEFAULT_PORT;

/// Capture session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnifferConfig {
    /// ZooKeeper client port. Segments sent to it are requests.
    pub port: u16,
    /// Cap on requests awaiting a reply. Unbounded when absent.
    pub max_outstanding_requests: Option<usize>,
    /// Pcap file read by [`Sniffer::run`](crate::Sniffer::run).
    pub capture_file: Option<PathBuf>,
    /// Network interface captured by [`Sniffer::run`](crate::Sniffer::run).
    pub interface: Option<String>,
    /// BPF expression for live capture.
    pub filter: Option<String>,
}

impl Default for SnifferConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_outstanding_requests: None,
            capture_file: None,
            interface: None,
            filter: None,
        }
    }
}

impl SnifferConfig {
    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no capture session can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".into()));
        }
        if self.max_outstanding_requests == Some(0) {
            return Err(ConfigError::Invalid(
                "max_outstanding_requests must be positive".into(),
            ));
        }
        if self.interface.as_deref() == Some("") {
            return Err(ConfigError::Invalid("interface must be non-empty".into()));
        }
        if self.interface.is_some() && self.capture_file.is_some() {
            return Err(ConfigError::Invalid(
                "capture_file and interface are mutually exclusive".into(),
            ));
        }
        Ok(())
    }

    /// The BPF expression installed on a live interface.
    pub fn effective_filter(&self) -> String {
        self.filter
            .clone()
            .unwrap_or_else(|| format!("port {}", self.port))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
