//! Protocol message types and command definitions.
//!
//! Uses proper enums with `TryFrom`; unknown values are errors, never panics.

use std::fmt;

use crate::error::ProtocolError;

// ── MessageType ──────────────────────────────────────────────────

/// Distinguishes commands (client → device) from responses (device → client).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// A request sent from the client to the device.
    Command = 0x1,
    /// A reply sent from the device to the client.
    Response = 0x2,
}

impl TryFrom<u32> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x1 => Ok(MessageType::Command),
            0x2 => Ok(MessageType::Response),
            _ => Err(ProtocolError::UnknownVariant {
                type_name: "MessageType",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Command => write!(f, "Command"),
            MessageType::Response => write!(f, "Response"),
        }
    }
}

// ── Command ──────────────────────────────────────────────────────

/// All commands understood by a Coyote unit.
///
/// Organized by category:
/// - `0x0001..0x00FF`: Protocol-level (handshake, goodbye, ping)
/// - `0x0100..0x01FF`: Playback transport
/// - `0x0200..0x02FF`: Preset selection and management
/// - `0x0300..0x03FF`: Read-only queries
/// - `0x0400..0x04FF`: Device lifecycle and hardware setup
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // ── Protocol (0x00xx) ────────────────────────────────────────
    /// Link handshake; answered with `DeviceInfo`.
    Hello = 0x0001,
    /// Graceful disconnect. No response.
    Goodbye = 0x0002,
    /// Liveness check with an empty body.
    Ping = 0x0003,

    // ── Playback (0x01xx) ────────────────────────────────────────
    Take = 0x0101,
    End = 0x0102,
    Pause = 0x0103,
    TakeNext = 0x0104,
    TakePrev = 0x0105,
    SeekTo = 0x0106,

    // ── Presets (0x02xx) ─────────────────────────────────────────
    SelectNext = 0x0201,
    SelectPrev = 0x0202,
    SelectPreset = 0x0203,
    DeletePreset = 0x0204,

    // ── Queries (0x03xx) ─────────────────────────────────────────
    GetTimeCode = 0x0301,
    GetMediaState = 0x0302,
    GetHardwareState = 0x0303,
    GetServerVersion = 0x0304,
    GetDisks = 0x0305,
    /// Preset listing with names and play state.
    GetPresets = 0x0306,

    // ── Lifecycle (0x04xx) ───────────────────────────────────────
    Reboot = 0x0401,
    SoftReboot = 0x0402,
    Shutdown = 0x0403,
    RestartService = 0x0404,
    EjectDisk = 0x0405,
    SetHardwareMode = 0x0406,
    InitializeCoyote = 0x0407,
}

impl TryFrom<u64> for Command {
    type Error = ProtocolError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Command::Hello),
            0x0002 => Ok(Command::Goodbye),
            0x0003 => Ok(Command::Ping),

            0x0101 => Ok(Command::Take),
            0x0102 => Ok(Command::End),
            0x0103 => Ok(Command::Pause),
            0x0104 => Ok(Command::TakeNext),
            0x0105 => Ok(Command::TakePrev),
            0x0106 => Ok(Command::SeekTo),

            0x0201 => Ok(Command::SelectNext),
            0x0202 => Ok(Command::SelectPrev),
            0x0203 => Ok(Command::SelectPreset),
            0x0204 => Ok(Command::DeletePreset),

            0x0301 => Ok(Command::GetTimeCode),
            0x0302 => Ok(Command::GetMediaState),
            0x0303 => Ok(Command::GetHardwareState),
            0x0304 => Ok(Command::GetServerVersion),
            0x0305 => Ok(Command::GetDisks),
            0x0306 => Ok(Command::GetPresets),

            0x0401 => Ok(Command::Reboot),
            0x0402 => Ok(Command::SoftReboot),
            0x0403 => Ok(Command::Shutdown),
            0x0404 => Ok(Command::RestartService),
            0x0405 => Ok(Command::EjectDisk),
            0x0406 => Ok(Command::SetHardwareMode),
            0x0407 => Ok(Command::InitializeCoyote),

            _ => Err(ProtocolError::UnknownVariant {
                type_name: "Command",
                value,
            }),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Command {
    /// Returns `true` if this command expects a response from the device.
    pub fn expects_response(&self) -> bool {
        !matches!(self, Command::Goodbye)
    }

    /// Read-only commands that are safe to transmit more than once.
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self,
            Command::Hello
                | Command::Ping
                | Command::GetTimeCode
                | Command::GetMediaState
                | Command::GetHardwareState
                | Command::GetServerVersion
                | Command::GetDisks
                | Command::GetPresets
        )
    }

    /// Static operation name used in error context and log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Hello => "Hello",
            Command::Goodbye => "Goodbye",
            Command::Ping => "Ping",
            Command::Take => "Take",
            Command::End => "End",
            Command::Pause => "Pause",
            Command::TakeNext => "TakeNext",
            Command::TakePrev => "TakePrev",
            Command::SeekTo => "SeekTo",
            Command::SelectNext => "SelectNext",
            Command::SelectPrev => "SelectPrev",
            Command::SelectPreset => "SelectPreset",
            Command::DeletePreset => "DeletePreset",
            Command::GetTimeCode => "GetTimeCode",
            Command::GetMediaState => "GetMediaState",
            Command::GetHardwareState => "GetHardwareState",
            Command::GetServerVersion => "GetServerVersion",
            Command::GetDisks => "GetDisks",
            Command::GetPresets => "GetPresets",
            Command::Reboot => "RebootCoyote",
            Command::SoftReboot => "SoftRebootCoyote",
            Command::Shutdown => "ShutdownCoyote",
            Command::RestartService => "RestartService",
            Command::EjectDisk => "EjectDisk",
            Command::SetHardwareMode => "SetHardwareMode",
            Command::InitializeCoyote => "InitializeCoyote",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_invalid() {
        assert!(MessageType::try_from(0xFF).is_err());
    }

    #[test]
    fn command_invalid() {
        assert!(Command::try_from(0xDEAD).is_err());
    }

    #[test]
    fn discriminants_follow_category_ranges() {
        assert_eq!(Command::try_from(0x0101).unwrap(), Command::Take);
        assert_eq!(Command::try_from(0x0301).unwrap(), Command::GetTimeCode);
        assert_eq!(Command::try_from(0x0407).unwrap(), Command::InitializeCoyote);
    }

    #[test]
    fn only_queries_are_idempotent() {
        assert!(Command::GetTimeCode.is_idempotent());
        assert!(Command::GetDisks.is_idempotent());
        assert!(Command::GetPresets.is_idempotent());
        assert!(!Command::Take.is_idempotent());
        assert!(!Command::SeekTo.is_idempotent());
        assert!(!Command::Reboot.is_idempotent());
        assert!(!Command::InitializeCoyote.is_idempotent());
    }

    #[test]
    fn goodbye_does_not_expect_response() {
        assert!(!Command::Goodbye.expects_response());
        assert!(Command::Ping.expects_response());
    }
}
