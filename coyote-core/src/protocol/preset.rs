//! Preset selection and media-state payloads.

use serde::{Deserialize, Serialize};

use super::Payload;

/// Request payload for `SelectPreset` / `DeletePreset`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresetRequest {
    pub key: i32,
}

impl Payload for PresetRequest {}

/// Response payload for `SelectNext` / `SelectPrev`: the key the device
/// now considers selected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionReply {
    pub selected: Option<i32>,
}

impl Payload for SelectionReply {}

/// Response payload for `Command::GetMediaState`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaState {
    pub preset_count: u32,
    pub selected: Option<i32>,
    pub playing: Vec<i32>,
    pub paused: Vec<i32>,
}

impl MediaState {
    pub fn is_playing(&self, key: i32) -> bool {
        self.playing.contains(&key)
    }

    pub fn is_paused(&self, key: i32) -> bool {
        self.paused.contains(&key)
    }
}

impl Payload for MediaState {}

/// One entry of the device's preset playlist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresetInfo {
    pub key: i32,
    /// Position in the playlist.
    pub index: i32,
    pub name: String,
    pub playing: bool,
    pub paused: bool,
    pub selected: bool,
}

/// Response payload for `Command::GetPresets`, in playlist order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresetList {
    pub presets: Vec<PresetInfo>,
}

impl PresetList {
    /// The entry the device marks as selected, if any.
    pub fn selected(&self) -> Option<&PresetInfo> {
        self.presets.iter().find(|p| p.selected)
    }
}

impl Payload for PresetList {}

/// Response payload for `Command::GetServerVersion`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerVersion {
    pub version: String,
}

impl Payload for ServerVersion {}
