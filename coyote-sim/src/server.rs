//! Accept loop for the simulator.
//!
//! Each accepted socket gets its own task. All connections share one
//! [`SimDevice`], so commands from different clients interleave the way
//! they would on real hardware.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use coyote_core::{Command, Connection, Packet, ProtocolError, ProtocolFlags};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::device::{Reply, SimDevice};

pub type SharedDevice = Arc<Mutex<SimDevice>>;

pub struct SimServer {
    listener: TcpListener,
    device: SharedDevice,
    running: Arc<AtomicBool>,
}

impl SimServer {
    /// Bind the control listener. The server counts as running from here
    /// until [`stop`](Self::stop) is called.
    pub async fn bind(config: &SimConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.network.listen).await?;
        Ok(Self {
            listener,
            device: Arc::new(Mutex::new(SimDevice::new(&config.device))),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle on the simulated device, for inspection.
    pub fn device(&self) -> SharedDevice {
        Arc::clone(&self.device)
    }

    /// Storing `false` stops the accept loop and every connection task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Accept clients until stopped.
    pub async fn run(&self) -> std::io::Result<()> {
        info!("simulator listening on {}", self.local_addr()?);

        while self.is_running() {
            let accept = tokio::select! {
                result = self.listener.accept() => result,
                _ = wait_for_stop(&self.running) => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                debug!("set_nodelay failed for {peer}: {e}");
            }

            info!("client connected from {peer}");
            let device = Arc::clone(&self.device);
            let running = Arc::clone(&self.running);
            tokio::spawn(async move {
                serve(Connection::new(stream), device, running).await;
                info!("client {peer} disconnected");
            });
        }

        info!("simulator stopped");
        Ok(())
    }
}

/// Answer commands on one connection until the peer leaves, a reply
/// closes the link, or the server stops.
async fn serve(mut conn: Connection, device: SharedDevice, running: Arc<AtomicBool>) {
    loop {
        let next = tokio::select! {
            next = conn.recv() => next,
            _ = wait_for_stop(&running) => return,
        };

        let packet = match next {
            Some(Ok(packet)) => packet,
            Some(Err(e)) => {
                warn!("dropping connection: {e}");
                return;
            }
            None => return,
        };
        if packet.is_response() {
            debug!(command = %packet.command(), "ignoring response from client");
            continue;
        }

        let command = packet.command();
        let reply = device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle(command, packet.payload());
        let Some(reply) = reply else {
            debug!(%command, "no reply");
            if command == Command::Goodbye {
                return;
            }
            continue;
        };

        let last = reply.last;
        match respond(&packet, reply) {
            Ok(response) => {
                if conn.send(response).await.is_err() {
                    return;
                }
            }
            Err(e) => warn!(%command, "could not build reply: {e}"),
        }
        if last {
            debug!(%command, "closing link after final reply");
            return;
        }
    }
}

fn respond(request: &Packet, reply: Reply) -> Result<Packet, ProtocolError> {
    let command = request.command();
    let mut flags = ProtocolFlags::empty();
    if command.is_idempotent() {
        flags |= ProtocolFlags::IDEMPOTENT;
    }
    if reply.last {
        flags |= ProtocolFlags::FINAL;
    }
    Ok(Packet::new_response(request.request_id(), command, reply.status, reply.body)?
        .with_flags(flags))
}

/// Resolves once `running` becomes false.
async fn wait_for_stop(running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::STATUS_OK;

    fn local_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.network.listen = "127.0.0.1:0".into();
        config
    }

    #[tokio::test]
    async fn stop_handle_works() {
        let server = SimServer::bind(&local_config()).await.unwrap();
        assert!(server.is_running());
        server.stop_handle().store(false, Ordering::SeqCst);
        assert!(!server.is_running());
        // Returns promptly once stopped.
        tokio::time::timeout(Duration::from_secs(1), server.run())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn replies_carry_flags() {
        let ping = Packet::new_command(3, Command::Ping, ProtocolFlags::empty(), Vec::new())
            .unwrap();
        let reply = Reply {
            status: STATUS_OK,
            body: Vec::new(),
            last: false,
        };
        let response = respond(&ping, reply).unwrap();
        assert!(response.is_response());
        assert_eq!(response.request_id(), 3);
        assert_eq!(response.flags(), ProtocolFlags::IDEMPOTENT);

        let reboot = Packet::new_command(4, Command::Reboot, ProtocolFlags::empty(), Vec::new())
            .unwrap();
        let reply = Reply {
            status: STATUS_OK,
            body: Vec::new(),
            last: true,
        };
        assert_eq!(respond(&reboot, reply).unwrap().flags(), ProtocolFlags::FINAL);
    }
}
