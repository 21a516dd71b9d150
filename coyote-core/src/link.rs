//! Transport link: the single connection a session holds to its device.
//!
//! A link runs one request at a time. Each attempt is
//!
//! ```text
//! ensure connected ──► send (bounded) ──► mark sent ──► recv (bounded)
//!   │ reconnect + Hello     │                               │
//!   ▼                       ▼                               ▼
//! failure before send   failure before send        failure after send
//! ```
//!
//! Idempotent queries retry transient failures with exponential backoff and
//! set [`ProtocolFlags::RETRY`] on retransmissions. Mutating commands are
//! attempted once; a failure after transmission becomes
//! [`CoyoteError::AmbiguousOutcome`].

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::{CoyoteError, ProtocolError, Target, TransportErrorKind};
use crate::flags::ProtocolFlags;
use crate::message::Command;
use crate::network::{Connector, Transport};
use crate::packet::Packet;
use crate::protocol::{ClientHello, DeviceInfo, PROTOCOL_API_VERSION, Payload};
use crate::state::{ConnectionPhase, RequestIds, TrackedRequest};

/// Client name announced in the `Hello` handshake.
const CLIENT_NAME: &str = concat!("coyote-core/", env!("CARGO_PKG_VERSION"));

/// How a single attempt failed.
#[derive(Debug)]
enum Failure {
    /// The request was never built; nothing reached the device.
    Invalid(String),
    /// Nothing was transmitted.
    BeforeSend(TransportErrorKind),
    /// The frame was handed to the transport, the response never arrived.
    AfterSend(TransportErrorKind),
}

impl Failure {
    fn kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Invalid(_) => None,
            Self::BeforeSend(kind) | Self::AfterSend(kind) => Some(*kind),
        }
    }

    fn into_error(self, command: Command, target: &Target) -> CoyoteError {
        let op = command.name();
        let target = target.clone();
        match self {
            Self::Invalid(reason) => CoyoteError::InvalidArgument { op, target, reason },
            Self::AfterSend(_) if !command.is_idempotent() => {
                CoyoteError::AmbiguousOutcome { op, target }
            }
            Self::BeforeSend(kind) | Self::AfterSend(kind) => {
                CoyoteError::Transport { op, target, kind }
            }
        }
    }
}

pub struct Link {
    address: String,
    connector: Arc<dyn Connector>,
    config: Arc<SessionConfig>,
    transport: Option<Box<dyn Transport>>,
    phase: ConnectionPhase,
    ids: RequestIds,
    in_flight: Option<TrackedRequest>,
    device: watch::Sender<DeviceInfo>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("address", &self.address)
            .field("phase", &self.phase)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl Link {
    /// Connect to `address` and complete the handshake.
    pub async fn open(
        address: &str,
        connector: Arc<dyn Connector>,
        config: Arc<SessionConfig>,
    ) -> Result<Self, CoyoteError> {
        let mut ids = RequestIds::new();
        let (transport, info) = establish(address, connector.as_ref(), &config, &mut ids).await?;
        info!(
            address,
            nickname = %info.nickname,
            server_version = %info.server_version,
            channels = info.channel_count,
            "link open"
        );

        let (device, _) = watch::channel(info);
        Ok(Self {
            address: address.to_string(),
            connector,
            config,
            transport: Some(transport),
            phase: ConnectionPhase::Connected {
                since: Instant::now(),
            },
            ids,
            in_flight: None,
            device,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn phase(&self) -> &ConnectionPhase {
        &self.phase
    }

    /// Receiver tracking the latest handshake answer; updated on reconnect.
    pub fn device_info(&self) -> watch::Receiver<DeviceInfo> {
        self.device.subscribe()
    }

    /// Send `command` and wait for its response. The response status is
    /// not inspected here.
    pub async fn request(
        &mut self,
        command: Command,
        payload: Vec<u8>,
        target: &Target,
    ) -> Result<Packet, CoyoteError> {
        if self.phase.is_closed() {
            return Err(CoyoteError::Transport {
                op: command.name(),
                target: target.clone(),
                kind: TransportErrorKind::Disconnected,
            });
        }

        let attempts = if command.is_idempotent() {
            self.config.retry.attempts()
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            match self.attempt(command, &payload, attempt > 1).await {
                Ok(response) => return Ok(response),
                Err(failure) if attempt < attempts && failure.kind().is_some() => {
                    let delay = self.config.retry.backoff(attempt);
                    debug!(
                        address = %self.address,
                        op = command.name(),
                        attempt,
                        ?delay,
                        ?failure,
                        "retrying query"
                    );
                    time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.into_error(command, target)),
            }
        }
    }

    async fn attempt(
        &mut self,
        command: Command,
        payload: &[u8],
        retry: bool,
    ) -> Result<Packet, Failure> {
        let mut flags = ProtocolFlags::empty();
        if command.is_idempotent() {
            flags |= ProtocolFlags::IDEMPOTENT;
        }
        if retry {
            flags |= ProtocolFlags::RETRY;
        }
        let request_id = self.ids.next_id();
        let packet = Packet::new_command(request_id, command, flags, payload.to_vec())
            .map_err(|e| Failure::Invalid(e.to_string()))?;

        self.ensure_connected().await?;

        let timeout = self.config.command_timeout();
        let Some(transport) = self.transport.as_mut() else {
            return Err(Failure::BeforeSend(TransportErrorKind::Disconnected));
        };
        self.in_flight = Some(TrackedRequest::new(request_id, command));
        trace!(request_id, op = command.name(), "send");

        let sent = match time::timeout(timeout, transport.send(packet)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportErrorKind::from(&e)),
            Err(_) => Err(TransportErrorKind::Timeout),
        };
        if let Err(kind) = sent {
            self.in_flight = None;
            self.connection_lost(kind).await;
            return Err(Failure::BeforeSend(kind));
        }
        if let Some(req) = self.in_flight.as_mut() {
            req.mark_sent();
        }

        let received = match time::timeout(timeout, transport.recv(request_id)).await {
            Ok(Ok(response)) if response.command() != command => {
                Err(TransportErrorKind::from(&ProtocolError::ProtocolViolation(
                    "response names a different command",
                )))
            }
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(TransportErrorKind::from(&e)),
            Err(_) => Err(TransportErrorKind::Timeout),
        };
        self.in_flight = None;

        match received {
            Ok(response) => {
                if response.flags().contains(ProtocolFlags::FINAL) {
                    debug!(address = %self.address, op = command.name(), "device closing link");
                    self.drop_transport().await;
                }
                Ok(response)
            }
            Err(kind) => {
                self.connection_lost(kind).await;
                Err(Failure::AfterSend(kind))
            }
        }
    }

    async fn ensure_connected(&mut self) -> Result<(), Failure> {
        if self.transport.is_some() && self.phase.is_connected() {
            return Ok(());
        }
        self.reconnect().await.map_err(|e| {
            warn!(address = %self.address, "reconnect failed: {e}");
            Failure::BeforeSend(TransportErrorKind::Disconnected)
        })
    }

    async fn reconnect(&mut self) -> Result<(), CoyoteError> {
        self.drop_transport().await;
        let violation = |e: ProtocolError| CoyoteError::connect(&self.address, e);
        self.phase.begin_connect().map_err(violation)?;
        self.phase.begin_handshake().map_err(violation)?;
        match establish(&self.address, self.connector.as_ref(), &self.config, &mut self.ids).await {
            Ok((transport, info)) => {
                self.phase
                    .complete_handshake()
                    .map_err(|e| CoyoteError::connect(&self.address, e))?;
                self.transport = Some(transport);
                info!(address = %self.address, nickname = %info.nickname, "link reconnected");
                self.device.send_replace(info);
                Ok(())
            }
            Err(e) => {
                let _ = self.phase.connection_lost();
                Err(e)
            }
        }
    }

    async fn connection_lost(&mut self, kind: TransportErrorKind) {
        debug!(address = %self.address, %kind, "dropping transport");
        self.drop_transport().await;
    }

    async fn drop_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        if !matches!(
            self.phase,
            ConnectionPhase::Disconnected | ConnectionPhase::Closed | ConnectionPhase::Disconnecting
        ) {
            let _ = self.phase.connection_lost();
        }
    }

    /// Forget the request a cancelled [`request`](Self::request) future left
    /// behind. A late response is discarded by request id; a half-open
    /// connection is torn down so the next request starts clean.
    pub async fn abandon(&mut self) -> Option<TrackedRequest> {
        if matches!(
            self.phase,
            ConnectionPhase::Connecting | ConnectionPhase::Handshaking
        ) {
            self.drop_transport().await;
        }
        let abandoned = self.in_flight.take();
        if let Some(req) = &abandoned {
            debug!(
                address = %self.address,
                request_id = req.request_id,
                op = req.command.name(),
                sent = req.was_sent(),
                "abandoned request"
            );
        }
        abandoned
    }

    /// Send `Goodbye` (best effort) and release the transport. Idempotent.
    pub async fn close(&mut self) {
        if self.phase.is_closed() {
            return;
        }
        if self.phase.begin_close().is_err() {
            return;
        }
        if let Some(mut transport) = self.transport.take() {
            let goodbye = Packet::new_command(
                self.ids.next_id(),
                Command::Goodbye,
                ProtocolFlags::empty(),
                Vec::new(),
            );
            if let Ok(goodbye) = goodbye {
                let timeout = self.config.command_timeout();
                if time::timeout(timeout, transport.send(goodbye)).await.is_err() {
                    debug!(address = %self.address, "goodbye timed out");
                }
            }
            transport.close().await;
        }
        let _ = self.phase.finish_close();
        info!(address = %self.address, "link closed");
    }
}

/// Connect and run the `Hello` exchange, bounded by the connect timeout.
async fn establish(
    address: &str,
    connector: &dyn Connector,
    config: &SessionConfig,
    ids: &mut RequestIds,
) -> Result<(Box<dyn Transport>, DeviceInfo), CoyoteError> {
    let connect_timeout = config.connect_timeout();
    let handshake = async {
        let mut transport = connector.connect(address).await?;
        match hello(transport.as_mut(), ids).await {
            Ok(info) => Ok::<_, CoyoteError>((transport, info)),
            Err(e) => {
                transport.close().await;
                Err(CoyoteError::connect(address, e))
            }
        }
    };
    match time::timeout(connect_timeout, handshake).await {
        Ok(Ok((transport, info))) if info.api_version != PROTOCOL_API_VERSION => {
            let mut transport = transport;
            transport.close().await;
            Err(CoyoteError::connect(
                address,
                format!("unsupported device API version {}", info.api_version),
            ))
        }
        Ok(result) => result,
        Err(_) => Err(CoyoteError::connect_timeout(address, connect_timeout)),
    }
}

async fn hello(transport: &mut dyn Transport, ids: &mut RequestIds) -> Result<DeviceInfo, String> {
    let request_id = ids.next_id();
    let payload = ClientHello::new(CLIENT_NAME)
        .to_bytes()
        .map_err(|e| e.to_string())?;
    let packet = Packet::new_command(request_id, Command::Hello, ProtocolFlags::IDEMPOTENT, payload)
        .map_err(|e| e.to_string())?;
    transport.send(packet).await.map_err(|e| e.to_string())?;
    let response = transport
        .recv(request_id)
        .await
        .map_err(|e| format!("handshake: {e}"))?;
    if response.status() != 0 {
        return Err(format!("handshake rejected with status {}", response.status()));
    }
    DeviceInfo::from_bytes(response.payload()).map_err(|e| format!("handshake: {e}"))
}
