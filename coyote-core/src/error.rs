//! Error types for the Coyote control core.
//!
//! Two layers:
//! - [`ProtocolError`]: wire-level failures (framing, checksums, payload
//!   encodings). Produced by the codec and payload types; never handed to
//!   callers directly.
//! - [`CoyoteError`]: the caller-facing taxonomy. Every variant that stems
//!   from a command carries the operation name and its [`Target`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::session::SessionId;

// ── ProtocolError ────────────────────────────────────────────────

/// Wire-level error raised while framing or decoding traffic.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Received bytes that do not start with the Coyote magic sequence.
    #[error("invalid magic bytes: expected CYT1")]
    InvalidMagic,

    /// A field in the frame header could not be parsed.
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    /// The payload failed checksum verification.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The frame is shorter or longer than its header claims.
    #[error("invalid packet length: expected {expected}, got {actual}")]
    InvalidPacketLength { expected: usize, actual: usize },

    /// A frame or state transition violated protocol rules.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// A payload could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ProtocolError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ProtocolError::ChannelClosed
    }
}

impl From<Box<bincode::ErrorKind>> for ProtocolError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        ProtocolError::Encoding(e.to_string())
    }
}

// ── TransportErrorKind ───────────────────────────────────────────

/// Sub-kind of a mid-session transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// No response (or no send slot) within the deadline.
    Timeout,
    /// The connection to the device went away.
    Disconnected,
    /// The device sent bytes that do not form a valid frame or payload.
    Malformed,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Malformed => write!(f, "malformed"),
        }
    }
}

impl From<&ProtocolError> for TransportErrorKind {
    fn from(e: &ProtocolError) -> Self {
        match e {
            ProtocolError::Io(_) | ProtocolError::ChannelClosed => Self::Disconnected,
            _ => Self::Malformed,
        }
    }
}

// ── Target ───────────────────────────────────────────────────────

/// What a command was aimed at, kept for error context and logging.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Target {
    #[default]
    None,
    Channel(i32),
    Preset(i32),
    Seek { channel: i32, time: u32 },
    Mode { resolution: i32, refresh: i32 },
    Disk(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Channel(c) => write!(f, " [channel {c}]"),
            Self::Preset(k) => write!(f, " [preset {k}]"),
            Self::Seek { channel, time } => write!(f, " [channel {channel} @ {time}]"),
            Self::Mode {
                resolution,
                refresh,
            } => write!(f, " [mode {resolution}/{refresh}]"),
            Self::Disk(d) => write!(f, " [disk {d:?}]"),
        }
    }
}

// ── CoyoteError ──────────────────────────────────────────────────

/// The caller-facing error type. All session operations return
/// `Result<T, CoyoteError>`.
#[derive(Debug, Error)]
pub enum CoyoteError {
    /// The transport link could not be established.
    #[error("cannot connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// Mid-session I/O failure.
    #[error("{op}{target}: transport {kind}")]
    Transport {
        op: &'static str,
        target: Target,
        kind: TransportErrorKind,
    },

    /// Local validation failure; the device was never contacted.
    #[error("{op}{target}: invalid argument: {reason}")]
    InvalidArgument {
        op: &'static str,
        target: Target,
        reason: String,
    },

    /// The device answered with a non-zero status.
    #[error("{op}{target}: device returned status {code}")]
    Device {
        op: &'static str,
        target: Target,
        code: i32,
    },

    /// A mutating command was transmitted but its outcome is unknown.
    #[error("{op}{target}: outcome unknown after transmission")]
    AmbiguousOutcome { op: &'static str, target: Target },

    /// The session was destroyed.
    #[error("{0} is closed")]
    SessionClosed(SessionId),
}

impl CoyoteError {
    /// The raw device status, for callers mapping codes via external docs.
    pub fn device_code(&self) -> Option<i32> {
        match self {
            Self::Device { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` if retrying the same call could plausibly succeed
    /// without changing its arguments.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Connect { .. })
    }

    pub(crate) fn invalid(op: &'static str, target: Target, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            op,
            target,
            reason: reason.into(),
        }
    }

    pub(crate) fn connect(address: &str, reason: impl fmt::Display) -> Self {
        Self::Connect {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn connect_timeout(address: &str, after: Duration) -> Self {
        Self::Connect {
            address: address.to_string(),
            reason: format!("timeout after {after:?}"),
        }
    }
}
