//! Playback transport payloads (`Take`, `End`, `Pause`, `SeekTo`,
//! `GetTimeCode`).

use serde::{Deserialize, Serialize};

use super::Payload;

/// Request payload for channel-addressed commands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelRequest {
    pub channel: i32,
}

impl Payload for ChannelRequest {}

/// Request payload for `Command::SeekTo`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeekRequest {
    pub channel: i32,
    /// Target time in device units; the device rejects values past TRT.
    pub time: u32,
}

impl Payload for SeekRequest {}
