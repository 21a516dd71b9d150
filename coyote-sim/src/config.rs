//! Configuration for the simulated device.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub network: NetworkConfig,
    /// What the simulated unit looks like.
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to accept control connections on.
    pub listen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Name reported in the handshake.
    pub nickname: String,
    /// Number of playback channels; valid indices are `1..=channels`.
    pub channels: u32,
    /// Preset keys present at startup, in playlist order.
    pub presets: Vec<i32>,
    /// Disk identifiers present at startup.
    pub disks: Vec<String>,
    /// Total running time of every preset, in device time units.
    pub trt: i32,
    /// Whether the unit advertises S12G output support.
    pub supports_s12g: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen: format!("0.0.0.0:{}", coyote_core::DEFAULT_PORT),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            nickname: "coyote-sim".into(),
            channels: 4,
            presets: vec![1, 2, 3],
            disks: vec!["A:".into(), "B:".into()],
            trt: 60_000,
            supports_s12g: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SimConfig {
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

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────
