//! # coyote-core
//!
//! Session-based control core for Coyote playback appliances.
//!
//! This crate contains:
//! - **Wire protocol**: `PacketHeader`, `Packet`, `Command`, `MessageType`, `ProtocolFlags`
//! - **Payloads**: typed request/response bodies, including the fixed-layout `TimeCode`
//! - **Codec**: `CoyoteCodec` for framed TCP I/O via `tokio_util`
//! - **Network**: `Transport`/`Connector` seams and their TCP implementations
//! - **Link**: one connection per session with reconnect and bounded query retry
//! - **Sessions**: `SessionManager`, which owns sessions and exposes every device operation
//! - **Config**: `SessionConfig`, loadable from TOML
//! - **Error**: `CoyoteError` for callers, `ProtocolError` for the wire
//!
//! ```no_run
//! # async fn demo() -> Result<(), coyote_core::CoyoteError> {
//! use coyote_core::{SessionConfig, SessionManager};
//!
//! let manager = SessionManager::new(SessionConfig::default());
//! let id = manager.new_session("10.0.0.20").await?;
//! manager.take(id, 1).await?;
//! let tc = manager.get_time_code(id, 1).await?;
//! println!("{} / {}", tc.time(), tc.trt());
//! manager.destroy_session(id).await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod flags;
pub mod header;
pub mod lifecycle;
pub mod link;
pub mod message;
pub mod network;
pub mod packet;
pub mod protocol;
pub mod selection;
pub mod session;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::CoyoteCodec;
pub use config::{DEFAULT_PORT, RetryConfig, SelectionConfig, SessionConfig};
pub use dispatcher::STATUS_OK;
pub use error::{CoyoteError, ProtocolError, Target, TransportErrorKind};
pub use flags::ProtocolFlags;
pub use header::{HEADER_SIZE, PacketHeader};
pub use link::Link;
pub use message::{Command, MessageType};
pub use network::{
    Connection, ConnectionInfo, ConnectionSender, Connector, TcpConnector, TcpTransport, Transport,
};
pub use packet::{MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, Packet};
pub use protocol::{
    DeviceInfo, HardwareMode, HardwareState, MediaState, Payload, PresetInfo, RefreshRate,
    Resolution, TimeCode,
};
pub use selection::{Freshness, Selection};
pub use session::{SessionId, SessionManager};
pub use state::{ConnectionPhase, TrackedRequest};
