//! Structured payloads carried inside [`Packet`] bodies.
//!
//! Every payload except [`TimeCode`] is a `serde` struct encoded with
//! `bincode`; the timecode record keeps an explicit fixed layout.
//!
//! [`Packet`]: crate::packet::Packet

pub mod disk;
pub mod handshake;
pub mod hardware;
pub mod playback;
pub mod preset;
pub mod timecode;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ProtocolError;

pub use disk::{DiskList, EjectRequest};
pub use handshake::{ClientHello, DeviceInfo, PROTOCOL_API_VERSION};
pub use hardware::{HardwareMode, HardwareState, RefreshRate, Resolution};
pub use playback::{ChannelRequest, SeekRequest};
pub use preset::{
    MediaState, PresetInfo, PresetList, PresetRequest, SelectionReply, ServerVersion,
};
pub use timecode::{NO_PRESET, TIMECODE_RECORD_SIZE, TimeCode};

/// A bincode-encoded packet body.
pub trait Payload: Serialize + DeserializeOwned {
    /// Serialize to bytes for a packet payload.
    fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from packet payload bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
