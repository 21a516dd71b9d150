//! Scriptable in-memory device behind the `Connector`/`Transport` seams.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coyote_core::protocol::{
    DeviceInfo, DiskList, HardwareMode, HardwareState, MediaState, PROTOCOL_API_VERSION,
    PresetInfo, PresetList, RefreshRate, Resolution, SelectionReply, ServerVersion, TimeCode,
};
use coyote_core::{
    Command, Connector, CoyoteError, Packet, Payload, ProtocolError, ProtocolFlags, SessionConfig,
    Transport,
};

/// What the device does with the next non-handshake request.
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer with this status and the default payload.
    Status(i32),
    /// Refuse the frame; nothing is transmitted.
    FailSend,
    /// Accept the frame, then drop the connection.
    DropAfterSend,
    /// Accept the frame and never answer.
    Hang,
    /// Answer normally after a pause.
    Delay(Duration),
    /// Answer normally, flagged as the device's last frame.
    Final,
    /// Answer with status 0 and a body that decodes as nothing.
    Garbled,
}

/// A frame the device accepted.
#[derive(Debug, Clone)]
pub struct Sent {
    pub command: Command,
    pub flags: ProtocolFlags,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct State {
    channels: u32,
    connects: usize,
    refuse_connect: bool,
    hello_status: i32,
    selected: Option<i32>,
    script: VecDeque<Step>,
    sent: Vec<Sent>,
}

#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<State>>,
}

impl MockDevice {
    pub fn new(channels: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                channels,
                connects: 0,
                refuse_connect: false,
                hello_status: 0,
                selected: None,
                script: VecDeque::new(),
                sent: Vec::new(),
            })),
        }
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    pub fn push(&self, step: Step) {
        self.state.lock().unwrap().script.push_back(step);
    }

    pub fn refuse_connections(&self) {
        self.state.lock().unwrap().refuse_connect = true;
    }

    pub fn reject_hello(&self, status: i32) {
        self.state.lock().unwrap().hello_status = status;
    }

    pub fn set_selected(&self, key: Option<i32>) {
        self.state.lock().unwrap().selected = key;
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    /// Accepted frames, excluding the handshake.
    pub fn sent(&self) -> Vec<Sent> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|s| s.command != Command::Hello)
            .cloned()
            .collect()
    }

    pub fn count(&self, command: Command) -> usize {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|s| s.command == command)
            .count()
    }

    /// Poll until `command` has been accepted `n` times.
    pub async fn wait_for(&self, command: Command, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.count(command) < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("device never saw the command");
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            api_version: PROTOCOL_API_VERSION,
            server_version: "9.1.0".into(),
            nickname: "mock".into(),
            channel_count: self.state.lock().unwrap().channels,
        }
    }

    fn body(&self, command: Command) -> Vec<u8> {
        let encoded = match command {
            Command::Hello => self.device_info().to_bytes(),
            Command::GetTimeCode => Ok(TimeCode::new(0.5, 100, 1000, Some(3), true)
                .encode()
                .to_vec()),
            Command::SelectNext | Command::SelectPrev => {
                SelectionReply { selected: Some(5) }.to_bytes()
            }
            Command::GetMediaState => MediaState {
                preset_count: 8,
                selected: self.state.lock().unwrap().selected,
                playing: vec![1],
                paused: Vec::new(),
            }
            .to_bytes(),
            Command::GetHardwareState => HardwareState {
                supports_s12g: true,
                mode: Some(HardwareMode::new(Resolution::P2160, RefreshRate::Hz60)),
                initialized: true,
            }
            .to_bytes(),
            Command::GetServerVersion => ServerVersion {
                version: "9.1.0".into(),
            }
            .to_bytes(),
            Command::GetPresets => {
                let selected = self.state.lock().unwrap().selected;
                PresetList {
                    presets: [(1, "Opening"), (2, "Intermission")]
                        .into_iter()
                        .enumerate()
                        .map(|(index, (key, name))| PresetInfo {
                            key,
                            index: index as i32,
                            name: name.into(),
                            playing: key == 1,
                            paused: false,
                            selected: selected == Some(key),
                        })
                        .collect(),
                }
                .to_bytes()
            }
            Command::GetDisks => DiskList {
                disks: vec!["A:".into(), "B:".into()],
            }
            .to_bytes(),
            _ => Ok(Vec::new()),
        };
        encoded.unwrap()
    }
}

#[async_trait]
impl Connector for MockDevice {
    async fn connect(&self, address: &str) -> Result<Box<dyn Transport>, CoyoteError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_connect {
            return Err(CoyoteError::Connect {
                address: address.to_string(),
                reason: "connection refused".into(),
            });
        }
        state.connects += 1;
        Ok(Box::new(MockTransport {
            device: self.clone(),
            pending: None,
            open: true,
        }))
    }
}

struct MockTransport {
    device: MockDevice,
    pending: Option<(Command, Step)>,
    open: bool,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, packet: Packet) -> Result<(), ProtocolError> {
        if !self.open {
            return Err(ProtocolError::ChannelClosed);
        }
        let command = packet.command();
        let step = {
            let mut state = self.device.state.lock().unwrap();
            let step = match command {
                Command::Hello => Step::Status(state.hello_status),
                Command::Goodbye => Step::Hang,
                _ => state.script.pop_front().unwrap_or(Step::Status(0)),
            };
            if matches!(step, Step::FailSend) {
                return Err(ProtocolError::ChannelClosed);
            }
            state.sent.push(Sent {
                command,
                flags: packet.flags(),
                payload: packet.payload().to_vec(),
            });
            step
        };
        self.pending = Some((command, step));
        Ok(())
    }

    async fn recv(&mut self, request_id: u64) -> Result<Packet, ProtocolError> {
        let Some((command, step)) = self.pending.take() else {
            return Err(ProtocolError::ChannelClosed);
        };
        let (status, flags) = match step {
            Step::Garbled => {
                return Packet::new_response(request_id, command, 0, vec![0xFF]);
            }
            Step::Status(status) => (status, ProtocolFlags::empty()),
            Step::Final => (0, ProtocolFlags::FINAL),
            Step::Delay(pause) => {
                tokio::time::sleep(pause).await;
                (0, ProtocolFlags::empty())
            }
            Step::Hang => std::future::pending().await,
            Step::DropAfterSend | Step::FailSend => {
                self.open = false;
                return Err(ProtocolError::ChannelClosed);
            }
        };
        let body = if status == 0 {
            self.device.body(command)
        } else {
            Vec::new()
        };
        Ok(Packet::new_response(request_id, command, status, body)?.with_flags(flags))
    }

    async fn close(&mut self) {
        self.open = false;
    }
}

/// Timeouts short enough for tests; retries without meaningful backoff.
pub fn fast_config() -> SessionConfig {
    let mut config = SessionConfig {
        connect_timeout_ms: 500,
        command_timeout_ms: 500,
        destroy_timeout_ms: 100,
        ..SessionConfig::default()
    };
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 5;
    config
}
