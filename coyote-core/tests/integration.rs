//! Integration tests over real TCP on localhost: framed connections, the
//! TCP transport, and a session driven against a minimal scripted device.

use std::time::Duration;

use coyote_core::protocol::{ChannelRequest, DeviceInfo, PROTOCOL_API_VERSION, TimeCode};
use coyote_core::{
    Command, Connection, ConnectionInfo, Connector, CoyoteError, MAX_PAYLOAD_SIZE, Packet,
    Payload, ProtocolFlags, SessionConfig, SessionManager, TcpConnector, Transport,
};
use tokio::net::TcpListener;

// ── Helpers ──────────────────────────────────────────────────────

/// Spin up a listener on an OS-assigned port and return the connection
/// info. The listener is returned so the caller can accept on it.
async fn ephemeral_listener() -> (TcpListener, ConnectionInfo) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let info = ConnectionInfo::new(addr.ip().to_string(), addr.port());
    (listener, info)
}

async fn connected_pair() -> (Connection, Connection) {
    let (listener, info) = ephemeral_listener().await;
    let client = tokio::spawn(async move { Connection::connect(&info).await.unwrap() });
    let (stream, _) = listener.accept().await.unwrap();
    (client.await.unwrap(), Connection::new(stream))
}

async fn recv(conn: &mut Connection) -> Packet {
    tokio::time::timeout(Duration::from_secs(5), conn.recv())
        .await
        .expect("timeout")
        .expect("stream closed")
        .expect("bad frame")
}

fn device_info() -> DeviceInfo {
    DeviceInfo {
        api_version: PROTOCOL_API_VERSION,
        server_version: "test".into(),
        nickname: "tcp-device".into(),
        channel_count: 2,
    }
}

/// Answer every command on `conn` with status 0 until the peer leaves or
/// `drop_after` commands (excluding Hello) have been answered.
async fn serve(mut conn: Connection, drop_after: Option<usize>) {
    let mut served = 0;
    while let Some(Ok(packet)) = conn.recv().await {
        let body = match packet.command() {
            Command::Hello => device_info().to_bytes().unwrap(),
            Command::Goodbye => return,
            Command::GetTimeCode => TimeCode::new(0.25, 250, 1000, None, false)
                .encode()
                .to_vec(),
            _ => Vec::new(),
        };
        let response =
            Packet::new_response(packet.request_id(), packet.command(), 0, body).unwrap();
        conn.send(response).await.unwrap();
        if packet.command() != Command::Hello {
            served += 1;
            if drop_after == Some(served) {
                return;
            }
        }
    }
}

// ── Connection ───────────────────────────────────────────────────

#[tokio::test]
async fn command_response_round_trip() {
    let (mut client, mut device) = connected_pair().await;

    let payload = ChannelRequest { channel: 2 }.to_bytes().unwrap();
    let cmd = Packet::new_command(1, Command::Take, ProtocolFlags::empty(), payload).unwrap();
    client.send(cmd).await.unwrap();

    let pkt = recv(&mut device).await;
    assert_eq!(pkt.command(), Command::Take);
    assert_eq!(ChannelRequest::from_bytes(pkt.payload()).unwrap().channel, 2);

    let resp = Packet::new_response(1, Command::Take, 4, Vec::new()).unwrap();
    device.send(resp).await.unwrap();

    let resp = recv(&mut client).await;
    assert!(resp.is_response());
    assert_eq!(resp.request_id(), 1);
    assert_eq!(resp.status(), 4);
}

#[tokio::test]
async fn frames_arrive_in_order() {
    let (client, mut device) = connected_pair().await;

    for i in 1u64..=5 {
        let cmd = Packet::new_command(i, Command::Ping, ProtocolFlags::IDEMPOTENT, Vec::new())
            .unwrap();
        client.send(cmd).await.unwrap();
    }
    for i in 1u64..=5 {
        assert_eq!(recv(&mut device).await.request_id(), i);
    }
}

#[tokio::test]
async fn max_payload_transfers_intact() {
    let (client, mut device) = connected_pair().await;

    let large = vec![0xABu8; MAX_PAYLOAD_SIZE];
    let cmd = Packet::new_command(1, Command::EjectDisk, ProtocolFlags::empty(), large.clone())
        .unwrap();
    client.send(cmd).await.unwrap();

    let pkt = recv(&mut device).await;
    assert_eq!(pkt.payload(), &large[..]);
}

#[tokio::test]
async fn peer_drop_ends_the_stream() {
    let (mut client, device) = connected_pair().await;
    drop(device);

    let result = tokio::time::timeout(Duration::from_secs(5), client.recv())
        .await
        .expect("timeout");
    assert!(result.is_none() || matches!(result, Some(Err(_))));
}

#[test]
fn oversized_payload_rejected() {
    let too_large = vec![0u8; MAX_PAYLOAD_SIZE + 1];
    let result = Packet::new_command(1, Command::EjectDisk, ProtocolFlags::empty(), too_large);
    assert!(result.is_err());
}

// ── TCP transport ────────────────────────────────────────────────

#[tokio::test]
async fn tcp_transport_skips_unrelated_responses() {
    let (listener, info) = ephemeral_listener().await;
    let device = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut conn = Connection::new(stream);
        let cmd = recv(&mut conn).await;
        // A late answer to some earlier request, then the real one.
        let stale = Packet::new_response(99, Command::GetTimeCode, 0, Vec::new()).unwrap();
        conn.send(stale).await.unwrap();
        let real = Packet::new_response(cmd.request_id(), Command::Ping, 0, Vec::new()).unwrap();
        conn.send(real).await.unwrap();
        conn
    });

    let connector = TcpConnector::new(8000);
    let mut transport = connector.connect(&info.to_string()).await.unwrap();
    let ping = Packet::new_command(7, Command::Ping, ProtocolFlags::IDEMPOTENT, Vec::new())
        .unwrap();
    transport.send(ping).await.unwrap();
    let resp = transport.recv(7).await.unwrap();
    assert_eq!(resp.request_id(), 7);
    assert_eq!(resp.command(), Command::Ping);

    transport.close().await;
    transport.close().await;
    let _device = device.await.unwrap();
}

#[tokio::test]
async fn tcp_connector_reports_refused_connections() {
    let (listener, info) = ephemeral_listener().await;
    drop(listener);
    let connector = TcpConnector::new(8000);
    assert!(matches!(
        connector.connect(&info.to_string()).await,
        Err(CoyoteError::Connect { .. })
    ));
}

// ── Sessions over TCP ────────────────────────────────────────────

#[tokio::test]
async fn session_over_tcp() {
    let (listener, info) = ephemeral_listener().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        serve(Connection::new(stream), None).await;
    });

    let manager = SessionManager::new(SessionConfig::default());
    let id = manager.new_session(&info.to_string()).await.unwrap();
    assert_eq!(manager.device_info(id).unwrap().nickname, "tcp-device");

    manager.take(id, 1).await.unwrap();
    let tc = manager.get_time_code(id, 2).await.unwrap();
    assert_eq!(tc.time(), 250);
    assert_eq!(tc.preset_key(), None);
    assert!(matches!(
        manager.take(id, 3).await,
        Err(CoyoteError::InvalidArgument { .. })
    ));

    manager.destroy_session(id).await.unwrap();
}

#[tokio::test]
async fn session_reconnects_after_device_drops_link() {
    let (listener, info) = ephemeral_listener().await;
    tokio::spawn(async move {
        // First connection drops after one command; the second stays up.
        let (stream, _) = listener.accept().await.unwrap();
        serve(Connection::new(stream), Some(1)).await;
        let (stream, _) = listener.accept().await.unwrap();
        serve(Connection::new(stream), None).await;
    });

    let mut config = SessionConfig::default();
    config.retry.initial_backoff_ms = 10;
    let manager = SessionManager::new(config);
    let id = manager.new_session(&info.to_string()).await.unwrap();

    manager.ping(id).await.unwrap();
    // The link notices the drop on this query and retries on a new link.
    let tc = manager.get_time_code(id, 1).await.unwrap();
    assert_eq!(tc.trt(), 1000);
    manager.destroy_session(id).await.unwrap();
}
