use async_trait::async_trait;
use tracing::{debug, trace};

use super::{Connection, ConnectionInfo, Connector, Transport};
use crate::error::{CoyoteError, ProtocolError};
use crate::packet::Packet;

/// Opens [`TcpTransport`]s, filling in `default_port` for bare hosts.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    default_port: u16,
}

impl TcpConnector {
    pub fn new(default_port: u16) -> Self {
        Self { default_port }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn Transport>, CoyoteError> {
        let info = ConnectionInfo::parse(address, self.default_port)
            .ok_or_else(|| CoyoteError::connect(address, "malformed address"))?;
        debug!(%info, "opening tcp transport");
        let conn = Connection::connect(&info)
            .await
            .map_err(|e| CoyoteError::connect(address, e))?;
        Ok(Box::new(TcpTransport::new(conn)))
    }
}

/// [`Transport`] over a framed TCP [`Connection`].
#[derive(Debug)]
pub struct TcpTransport {
    conn: Option<Connection>,
}

impl TcpTransport {
    pub fn new(conn: Connection) -> Self {
        Self { conn: Some(conn) }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, packet: Packet) -> Result<(), ProtocolError> {
        let conn = self.conn.as_ref().ok_or(ProtocolError::ChannelClosed)?;
        conn.send(packet).await
    }

    async fn recv(&mut self, request_id: u64) -> Result<Packet, ProtocolError> {
        let conn = self.conn.as_mut().ok_or(ProtocolError::ChannelClosed)?;
        loop {
            match conn.recv().await {
                None => return Err(ProtocolError::ChannelClosed),
                Some(Err(e)) => return Err(e),
                Some(Ok(packet)) if packet.is_response() && packet.request_id() == request_id => {
                    return Ok(packet);
                }
                Some(Ok(packet)) => {
                    trace!(
                        expected = request_id,
                        got = packet.request_id(),
                        command = %packet.command(),
                        "discarding unrelated frame"
                    );
                }
            }
        }
    }

    async fn close(&mut self) {
        self.conn.take();
    }
}
