use std::fmt;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::codec::CoyoteCodec;
use crate::error::ProtocolError;
use crate::packet::Packet;

const CHANNEL_DEPTH: usize = 64;

pub type ConnectionSender = mpsc::Sender<Packet>;

/// A framed connection with background reader and writer tasks.
///
/// Used on both ends of the protocol: the client transport wraps one per
/// device link, the simulator wraps one per accepted client.
#[derive(Debug)]
pub struct Connection {
    // Channel to send packets to background writer task
    tx: mpsc::Sender<Packet>,
    // Channel to receive packets (or the error that ended the stream)
    rx: mpsc::Receiver<Result<Packet, ProtocolError>>,
    reader: JoinHandle<()>,
}

impl Connection {
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (mut net_writer, mut net_reader) = Framed::new(stream, CoyoteCodec).split();

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel::<Packet>(CHANNEL_DEPTH);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel(CHANNEL_DEPTH);

        // Writer task: runs until every sender is dropped, so queued
        // frames (e.g. a Goodbye) are flushed before the socket closes.
        tokio::spawn(async move {
            while let Some(packet) = network_rx.recv().await {
                if let Err(e) = net_writer.send(packet).await {
                    warn!("network write error: {e}");
                    break;
                }
            }
            let _ = net_writer.close().await;
        });

        // Reader task: forwards frames, and the first error, then stops.
        let reader = tokio::spawn(async move {
            while let Some(result) = net_reader.next().await {
                let failed = result.is_err();
                if let Err(e) = &result {
                    debug!("network read error: {e}");
                }
                if network_tx.send(result).await.is_err() || failed {
                    break;
                }
            }
        });

        Self {
            tx: user_tx,
            rx: user_rx,
            reader,
        }
    }

    pub async fn connect(conn_info: &ConnectionInfo) -> Result<Self, std::io::Error> {
        let stream = TcpStream::connect(conn_info.to_string()).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    pub async fn send(&self, packet: Packet) -> Result<(), ProtocolError> {
        Ok(self.tx.send(packet).await?)
    }

    /// Next inbound frame; `None` once the peer has closed the stream.
    pub async fn recv(&mut self) -> Option<Result<Packet, ProtocolError>> {
        self.rx.recv().await
    }

    pub fn sender(&self) -> ConnectionSender {
        self.tx.clone()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// A `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    host: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port`, `[v6]:port` or `http://host[:port]`,
    /// using `default_port` when none is given.
    pub fn parse(address: &str, default_port: u16) -> Option<Self> {
        let address = address.trim();
        let address = address.strip_prefix("http://").unwrap_or(address);
        let address = address.trim_end_matches('/');
        if address.is_empty() {
            return None;
        }

        if let Some(rest) = address.strip_prefix('[') {
            let (host, tail) = rest.split_once(']')?;
            let port = match tail.strip_prefix(':') {
                Some(p) => p.parse().ok()?,
                None if tail.is_empty() => default_port,
                None => return None,
            };
            return Some(Self::new(host, port));
        }

        match address.rsplit_once(':') {
            // A bare IPv6 literal has several colons and no port.
            Some((host, _)) if host.contains(':') => Some(Self::new(address, default_port)),
            Some((host, port)) if !host.is_empty() => Some(Self::new(host, port.parse().ok()?)),
            Some(_) => None,
            None => Some(Self::new(address, default_port)),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
