//! Configuration for sessions and their transport links.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Port used when an address carries no explicit port.
pub const DEFAULT_PORT: u16 = 8000;

/// Top-level session configuration, loadable from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Port assumed for bare `host` addresses.
    pub default_port: u16,
    /// Upper bound on TCP connect plus handshake.
    pub connect_timeout_ms: u64,
    /// Upper bound on each send and each receive.
    pub command_timeout_ms: u64,
    /// How long destroy waits for an in-flight command before cancelling it.
    pub destroy_timeout_ms: u64,
    /// Retry policy for idempotent queries.
    pub retry: RetryConfig,
    /// Selection cache policy.
    pub selection: SelectionConfig,
}

/// Bounded exponential backoff for read-only queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first. `1` disables retries.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Age below which a cached selection may drive a mutation.
    /// Unset means mutations always query the device.
    pub staleness_ms: Option<u64>,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_PORT,
            connect_timeout_ms: 5_000,
            command_timeout_ms: 10_000,
            destroy_timeout_ms: 2_000,
            retry: RetryConfig::default(),
            selection: SelectionConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        }
    }
}

// ── Accessors ────────────────────────────────────────────────────

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn destroy_timeout(&self) -> Duration {
        Duration::from_millis(self.destroy_timeout_ms)
    }

    pub fn selection_staleness(&self) -> Option<Duration> {
        self.selection.staleness_ms.map(Duration::from_millis)
    }
}

impl RetryConfig {
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before retry number `retry` (1-based), doubling up to the cap.
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SessionConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}
