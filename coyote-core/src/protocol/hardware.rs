//! Hardware mode enumerations and state.
//!
//! A hardware mode is the pair `(resolution, refresh rate)` applied by
//! `SetHardwareMode` and `InitializeCoyote`. Raw integers coming from
//! callers are checked against these enumerations before anything is
//! sent to the device.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Payload;
use crate::error::ProtocolError;

#[repr(i32)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Resolution {
    P1080 = 1,
    P2160 = 2,
}

impl TryFrom<i32> for Resolution {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Resolution::P1080),
            2 => Ok(Resolution::P2160),
            _ => Err(ProtocolError::UnknownVariant {
                type_name: "Resolution",
                value: value as u32 as u64,
            }),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::P1080 => write!(f, "1080p"),
            Resolution::P2160 => write!(f, "2160p"),
        }
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RefreshRate {
    Hz23_98 = 1,
    Hz24 = 2,
    Hz25 = 3,
    Hz29_97 = 4,
    Hz30 = 5,
    Hz50 = 6,
    Hz59_94 = 7,
    Hz60 = 8,
}

impl TryFrom<i32> for RefreshRate {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RefreshRate::Hz23_98),
            2 => Ok(RefreshRate::Hz24),
            3 => Ok(RefreshRate::Hz25),
            4 => Ok(RefreshRate::Hz29_97),
            5 => Ok(RefreshRate::Hz30),
            6 => Ok(RefreshRate::Hz50),
            7 => Ok(RefreshRate::Hz59_94),
            8 => Ok(RefreshRate::Hz60),
            _ => Err(ProtocolError::UnknownVariant {
                type_name: "RefreshRate",
                value: value as u32 as u64,
            }),
        }
    }
}

impl fmt::Display for RefreshRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = match self {
            RefreshRate::Hz23_98 => "23.98",
            RefreshRate::Hz24 => "24",
            RefreshRate::Hz25 => "25",
            RefreshRate::Hz29_97 => "29.97",
            RefreshRate::Hz30 => "30",
            RefreshRate::Hz50 => "50",
            RefreshRate::Hz59_94 => "59.94",
            RefreshRate::Hz60 => "60",
        };
        write!(f, "{hz}Hz")
    }
}

/// Request payload for `SetHardwareMode` / `InitializeCoyote`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HardwareMode {
    pub resolution: Resolution,
    pub refresh: RefreshRate,
}

impl HardwareMode {
    pub fn new(resolution: Resolution, refresh: RefreshRate) -> Self {
        Self {
            resolution,
            refresh,
        }
    }

    /// Validate a raw `(resolution, refresh)` pair.
    pub fn from_raw(resolution: i32, refresh: i32) -> Result<Self, ProtocolError> {
        Ok(Self {
            resolution: Resolution::try_from(resolution)?,
            refresh: RefreshRate::try_from(refresh)?,
        })
    }
}

impl fmt::Display for HardwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.resolution, self.refresh)
    }
}

impl Payload for HardwareMode {}

/// Response payload for `Command::GetHardwareState`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HardwareState {
    pub supports_s12g: bool,
    /// `None` until the unit has been initialized.
    pub mode: Option<HardwareMode>,
    pub initialized: bool,
}

impl Payload for HardwareState {}
