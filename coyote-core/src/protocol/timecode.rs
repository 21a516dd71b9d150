//! Playback-position snapshot returned by `GetTimeCode`.
//!
//! ## Wire format (21 bytes, little-endian)
//!
//! ```text
//! scrub:       f64  (8)   normalized position, 0.0..=1.0
//! time:        i32  (4)   current time, device units
//! trt:         i32  (4)   total running time, device units
//! preset_key:  i32  (4)   -1 when no preset is associated
//! selected:    u8   (1)   0 or 1
//! ```

use crate::error::ProtocolError;

/// Encoded size of a timecode record.
pub const TIMECODE_RECORD_SIZE: usize = 21;

/// Wire sentinel for "no preset".
pub const NO_PRESET: i32 = -1;

/// Immutable point-in-time playback position for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeCode {
    scrub: f64,
    time: i32,
    trt: i32,
    preset_key: Option<i32>,
    selected: bool,
}

impl TimeCode {
    /// `Some(NO_PRESET)` is the wire sentinel and is stored as `None`.
    pub fn new(scrub: f64, time: i32, trt: i32, preset_key: Option<i32>, selected: bool) -> Self {
        Self {
            scrub,
            time,
            trt,
            preset_key: preset_key.filter(|&key| key != NO_PRESET),
            selected,
        }
    }

    /// Normalized scrub-bar position.
    pub fn scrub(&self) -> f64 {
        self.scrub
    }

    pub fn time(&self) -> i32 {
        self.time
    }

    /// Total running time.
    pub fn trt(&self) -> i32 {
        self.trt
    }

    pub fn preset_key(&self) -> Option<i32> {
        self.preset_key
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Time left until the end of the media, never negative.
    pub fn remaining(&self) -> i32 {
        self.trt.saturating_sub(self.time).max(0)
    }

    pub fn encode(&self) -> [u8; TIMECODE_RECORD_SIZE] {
        let mut buf = [0u8; TIMECODE_RECORD_SIZE];
        buf[0..8].copy_from_slice(&self.scrub.to_le_bytes());
        buf[8..12].copy_from_slice(&self.time.to_le_bytes());
        buf[12..16].copy_from_slice(&self.trt.to_le_bytes());
        buf[16..20].copy_from_slice(&self.preset_key.unwrap_or(NO_PRESET).to_le_bytes());
        buf[20] = self.selected as u8;
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() != TIMECODE_RECORD_SIZE {
            return Err(ProtocolError::InvalidPacketLength {
                expected: TIMECODE_RECORD_SIZE,
                actual: data.len(),
            });
        }

        let mut f = [0u8; 8];
        f.copy_from_slice(&data[0..8]);
        let scrub = f64::from_le_bytes(f);
        if !scrub.is_finite() {
            return Err(ProtocolError::Encoding(format!(
                "non-finite scrub position {scrub}"
            )));
        }

        let int_at = |at: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&data[at..at + 4]);
            i32::from_le_bytes(b)
        };
        let preset_key = match int_at(16) {
            NO_PRESET => None,
            key => Some(key),
        };
        let selected = match data[20] {
            0 => false,
            1 => true,
            other => {
                return Err(ProtocolError::Encoding(format!(
                    "selected flag must be 0 or 1, got {other}"
                )));
            }
        };

        Ok(Self {
            scrub,
            time: int_at(8),
            trt: int_at(12),
            preset_key,
            selected,
        })
    }
}
