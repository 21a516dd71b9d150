//! Link connection state machine.
//!
//! ```text
//!  Disconnected ──► Connecting ──► Handshaking ──► Connected
//!       ▲   ▲            │               │              │
//!       │   └────────────┴─── failure ───┘              │
//!       └──────────────────── lost ─────────────────────┤
//!                                                       ▼
//!                         Closed ◄──── Disconnecting ◄──┘
//! ```
//!
//! `Disconnected` is recoverable: the next request reconnects. `Closed` is
//! terminal and only reached through an explicit close.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No transport. Initial state, and the state after a lost connection.
    #[default]
    Disconnected,

    /// Transport connection initiated but not yet established.
    Connecting,

    /// Transport is up; waiting for the device's answer to `Hello`.
    Handshaking,

    /// Handshake complete; ready for commands.
    Connected {
        since: Instant,
    },

    /// Explicit close in progress (Goodbye queued).
    Disconnecting,

    /// Closed for good; no further reconnects.
    Closed,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Handshaking => "Handshaking",
            Self::Connected { .. } => "Connected",
            Self::Disconnecting => "Disconnecting",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}

impl ConnectionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// How long the link has been connected, `None` in any other phase.
    pub fn connected_duration(&self) -> Option<Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    fn step(
        &mut self,
        allowed: fn(&Self) -> bool,
        next: Self,
        violation: &'static str,
    ) -> Result<(), ProtocolError> {
        if !allowed(self) {
            return Err(ProtocolError::ProtocolViolation(violation));
        }
        *self = next;
        Ok(())
    }

    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), ProtocolError> {
        self.step(
            |p| matches!(p, Self::Disconnected),
            Self::Connecting,
            "cannot connect: link is not disconnected",
        )
    }

    /// Valid from: `Connecting`.
    pub fn begin_handshake(&mut self) -> Result<(), ProtocolError> {
        self.step(
            |p| matches!(p, Self::Connecting),
            Self::Handshaking,
            "cannot handshake: link is not connecting",
        )
    }

    /// Valid from: `Handshaking`.
    pub fn complete_handshake(&mut self) -> Result<(), ProtocolError> {
        self.step(
            |p| matches!(p, Self::Handshaking),
            Self::Connected {
                since: Instant::now(),
            },
            "cannot complete handshake: link is not handshaking",
        )
    }

    /// Connect or handshake failed, or an established connection was
    /// lost. A later request may reconnect.
    ///
    /// Valid from: `Connecting`, `Handshaking`, `Connected`.
    pub fn connection_lost(&mut self) -> Result<(), ProtocolError> {
        self.step(
            |p| matches!(p, Self::Connecting | Self::Handshaking | Self::Connected { .. }),
            Self::Disconnected,
            "cannot lose a connection that is not being established or up",
        )
    }

    /// Valid from every phase except `Closed`.
    pub fn begin_close(&mut self) -> Result<(), ProtocolError> {
        self.step(
            |p| !matches!(p, Self::Closed),
            Self::Disconnecting,
            "link already closed",
        )
    }

    /// Valid from: `Disconnecting`.
    pub fn finish_close(&mut self) -> Result<(), ProtocolError> {
        self.step(
            |p| matches!(p, Self::Disconnecting),
            Self::Closed,
            "cannot finish close: no close in progress",
        )
    }
}
