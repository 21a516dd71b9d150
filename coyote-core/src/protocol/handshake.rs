//! Link handshake.
//!
//! ```text
//! Client ──[Hello]──────────────────────────► Device
//!   Payload: ClientHello (bincode)
//!
//! Device ──[Hello, status 0]────────────────► Client
//!   Payload: DeviceInfo (bincode)
//! ```

use serde::{Deserialize, Serialize};

use super::Payload;

/// API version spoken by this crate.
pub const PROTOCOL_API_VERSION: u32 = 1;

/// Request payload for `Command::Hello`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientHello {
    pub api_version: u32,
    /// Free-form client identification shown in device logs.
    pub client: String,
}

impl ClientHello {
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            api_version: PROTOCOL_API_VERSION,
            client: client.into(),
        }
    }
}

impl Payload for ClientHello {}

/// What the device reports about itself when a link opens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub api_version: u32,
    pub server_version: String,
    pub nickname: String,
    /// Number of hardware channels; valid channel indices are `1..=channel_count`.
    pub channel_count: u32,
}

impl DeviceInfo {
    /// Whether `channel` addresses a channel on this device.
    pub fn has_channel(&self, channel: i32) -> bool {
        channel >= 1 && (channel as u32) <= self.channel_count
    }
}

impl Payload for DeviceInfo {}
