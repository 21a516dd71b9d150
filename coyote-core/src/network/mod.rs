//! Byte-level transport: framed connections and the seams the link is
//! built on.

mod connection;
mod tcp;

use async_trait::async_trait;

use crate::error::{CoyoteError, ProtocolError};
use crate::packet::Packet;

pub use connection::{Connection, ConnectionInfo, ConnectionSender};
pub use tcp::{TcpConnector, TcpTransport};

/// One open, half-duplex channel to a device.
///
/// The link drives exactly one request at a time: [`send`] a command, then
/// [`recv`] the response carrying the same request id.
///
/// [`send`]: Transport::send
/// [`recv`]: Transport::recv
#[async_trait]
pub trait Transport: Send {
    /// Transmit one command frame.
    async fn send(&mut self, packet: Packet) -> Result<(), ProtocolError>;

    /// Wait for the response to `request_id`, discarding unrelated frames.
    async fn recv(&mut self, request_id: u64) -> Result<Packet, ProtocolError>;

    /// Release the connection. Must be safe to call more than once.
    async fn close(&mut self);
}

/// Opens transports to device addresses.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Box<dyn Transport>, CoyoteError>;
}
