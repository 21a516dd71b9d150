//! Device state machine: answers one command at a time.
//!
//! Status codes follow the appliance's conventions: `0` success, `1`
//! command failed, `2` unimplemented, `3` internal error, `4` misused
//! (bad arguments).

use coyote_core::protocol::{
    ChannelRequest, ClientHello, DeviceInfo, DiskList, EjectRequest, HardwareMode, HardwareState,
    MediaState, PROTOCOL_API_VERSION, PresetInfo, PresetList, PresetRequest, SeekRequest,
    SelectionReply, ServerVersion, TimeCode,
};
use coyote_core::{Command, Payload, ProtocolError};
use tracing::debug;

use crate::config::DeviceConfig;

pub const STATUS_OK: i32 = 0;
pub const STATUS_FAILED: i32 = 1;
pub const STATUS_UNIMPLEMENTED: i32 = 2;
pub const STATUS_INTERNAL: i32 = 3;
pub const STATUS_MISUSED: i32 = 4;

/// The device's answer to one command.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: i32,
    pub body: Vec<u8>,
    /// The device drops the connection after sending this reply.
    pub last: bool,
}

impl Reply {
    fn ok(body: Vec<u8>) -> Self {
        Self {
            status: STATUS_OK,
            body,
            last: false,
        }
    }

    fn status(status: i32) -> Self {
        Self {
            status,
            body: Vec::new(),
            last: false,
        }
    }

    fn payload<P: Payload>(value: &P) -> Self {
        match value.to_bytes() {
            Ok(body) => Self::ok(body),
            Err(_) => Self::status(STATUS_INTERNAL),
        }
    }

    fn closing(mut self) -> Self {
        self.last = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
struct Channel {
    preset: Option<i32>,
    time: i32,
    paused: bool,
}

#[derive(Debug)]
pub struct SimDevice {
    nickname: String,
    trt: i32,
    supports_s12g: bool,
    channels: Vec<Channel>,
    presets: Vec<i32>,
    selected: Option<i32>,
    disks: Vec<String>,
    mode: Option<HardwareMode>,
    initialized: bool,
}

impl SimDevice {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            nickname: config.nickname.clone(),
            trt: config.trt.max(0),
            supports_s12g: config.supports_s12g,
            channels: vec![Channel::default(); config.channels as usize],
            presets: config.presets.clone(),
            selected: None,
            disks: config.disks.clone(),
            mode: None,
            initialized: false,
        }
    }

    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            api_version: PROTOCOL_API_VERSION,
            server_version: env!("CARGO_PKG_VERSION").into(),
            nickname: self.nickname.clone(),
            channel_count: self.channels.len() as u32,
        }
    }

    pub fn selected(&self) -> Option<i32> {
        self.selected
    }

    /// Handle one command. `None` means the command gets no reply.
    pub fn handle(&mut self, command: Command, payload: &[u8]) -> Option<Reply> {
        let reply = match command {
            Command::Goodbye => return None,
            Command::Hello => self.hello(payload),
            Command::Ping => Ok(Reply::ok(Vec::new())),

            Command::Take => ChannelRequest::from_bytes(payload).map(|r| self.take(r.channel)),
            Command::End => ChannelRequest::from_bytes(payload).map(|r| self.end(r.channel)),
            Command::Pause => ChannelRequest::from_bytes(payload).map(|r| self.pause(r.channel)),
            Command::TakeNext => Ok(self.take_step(1)),
            Command::TakePrev => Ok(self.take_step(-1)),
            Command::SeekTo => SeekRequest::from_bytes(payload).map(|r| self.seek(r.channel, r.time)),

            Command::SelectNext => Ok(self.select_step(1)),
            Command::SelectPrev => Ok(self.select_step(-1)),
            Command::SelectPreset => PresetRequest::from_bytes(payload).map(|r| self.select(r.key)),
            Command::DeletePreset => PresetRequest::from_bytes(payload).map(|r| self.delete(r.key)),

            Command::GetTimeCode => {
                ChannelRequest::from_bytes(payload).map(|r| self.time_code(r.channel))
            }
            Command::GetMediaState => Ok(Reply::payload(&self.media_state())),
            Command::GetHardwareState => Ok(Reply::payload(&HardwareState {
                supports_s12g: self.supports_s12g,
                mode: self.mode,
                initialized: self.initialized,
            })),
            Command::GetServerVersion => Ok(Reply::payload(&ServerVersion {
                version: self.info().server_version,
            })),
            Command::GetPresets => Ok(Reply::payload(&self.preset_list())),
            Command::GetDisks => Ok(Reply::payload(&DiskList {
                disks: self.disks.clone(),
            })),

            Command::Reboot => {
                self.reset_playback();
                self.selected = None;
                Ok(Reply::ok(Vec::new()).closing())
            }
            Command::SoftReboot => {
                self.reset_playback();
                Ok(Reply::ok(Vec::new()).closing())
            }
            Command::Shutdown => Ok(Reply::ok(Vec::new()).closing()),
            Command::RestartService => Ok(Reply::ok(Vec::new())),
            Command::EjectDisk => EjectRequest::from_bytes(payload).map(|r| self.eject(&r.disk)),
            Command::SetHardwareMode => HardwareMode::from_bytes(payload).map(|m| self.set_mode(m)),
            Command::InitializeCoyote => {
                HardwareMode::from_bytes(payload).map(|m| self.initialize(m))
            }
        };

        Some(reply.unwrap_or_else(|e: ProtocolError| {
            debug!(%command, "undecodable payload: {e}");
            Reply::status(STATUS_MISUSED)
        }))
    }

    // ── Handlers ─────────────────────────────────────────────────

    fn hello(&self, payload: &[u8]) -> Result<Reply, ProtocolError> {
        let hello = ClientHello::from_bytes(payload)?;
        if hello.api_version != PROTOCOL_API_VERSION {
            return Ok(Reply::status(STATUS_UNIMPLEMENTED));
        }
        debug!(client = %hello.client, "hello");
        Ok(Reply::payload(&self.info()))
    }

    fn channel(&mut self, channel: i32) -> Option<&mut Channel> {
        let index = usize::try_from(channel).ok()?.checked_sub(1)?;
        self.channels.get_mut(index)
    }

    fn take(&mut self, channel: i32) -> Reply {
        let Some(preset) = self.selected else {
            return Reply::status(STATUS_FAILED);
        };
        match self.channel(channel) {
            Some(ch) => {
                if ch.preset != Some(preset) {
                    ch.time = 0;
                }
                ch.preset = Some(preset);
                ch.paused = false;
                Reply::ok(Vec::new())
            }
            None => Reply::status(STATUS_MISUSED),
        }
    }

    fn end(&mut self, channel: i32) -> Reply {
        match self.channel(channel) {
            Some(ch) => {
                *ch = Channel::default();
                Reply::ok(Vec::new())
            }
            None => Reply::status(STATUS_MISUSED),
        }
    }

    fn pause(&mut self, channel: i32) -> Reply {
        match self.channel(channel) {
            Some(ch) if ch.preset.is_some() => {
                ch.paused = true;
                Reply::ok(Vec::new())
            }
            Some(_) => Reply::status(STATUS_FAILED),
            None => Reply::status(STATUS_MISUSED),
        }
    }

    /// Step the selection and take it on the first channel.
    fn take_step(&mut self, step: isize) -> Reply {
        if self.presets.is_empty() {
            return Reply::status(STATUS_FAILED);
        }
        self.selected = self.neighbour(step);
        self.take(1)
    }

    fn seek(&mut self, channel: i32, time: u32) -> Reply {
        let trt = self.trt;
        match self.channel(channel) {
            Some(ch) if ch.preset.is_none() => Reply::status(STATUS_FAILED),
            Some(ch) => match i32::try_from(time) {
                Ok(time) if time <= trt => {
                    ch.time = time;
                    Reply::ok(Vec::new())
                }
                _ => Reply::status(STATUS_MISUSED),
            },
            None => Reply::status(STATUS_MISUSED),
        }
    }

    fn neighbour(&self, step: isize) -> Option<i32> {
        let len = self.presets.len() as isize;
        if len == 0 {
            return None;
        }
        let current = self
            .selected
            .and_then(|key| self.presets.iter().position(|&k| k == key));
        let next = match current {
            Some(i) => (i as isize + step).rem_euclid(len),
            None if step >= 0 => 0,
            None => len - 1,
        };
        Some(self.presets[next as usize])
    }

    fn select_step(&mut self, step: isize) -> Reply {
        self.selected = self.neighbour(step);
        Reply::payload(&SelectionReply {
            selected: self.selected,
        })
    }

    fn select(&mut self, key: i32) -> Reply {
        if !self.presets.contains(&key) {
            return Reply::status(STATUS_FAILED);
        }
        self.selected = Some(key);
        Reply::ok(Vec::new())
    }

    fn delete(&mut self, key: i32) -> Reply {
        let Some(index) = self.presets.iter().position(|&k| k == key) else {
            return Reply::status(STATUS_FAILED);
        };
        self.presets.remove(index);
        if self.selected == Some(key) {
            self.selected = None;
        }
        for ch in self.channels.iter_mut().filter(|ch| ch.preset == Some(key)) {
            *ch = Channel::default();
        }
        Reply::ok(Vec::new())
    }

    fn time_code(&mut self, channel: i32) -> Reply {
        let (trt, selected) = (self.trt, self.selected);
        let Some(ch) = self.channel(channel) else {
            return Reply::status(STATUS_MISUSED);
        };
        let scrub = if trt > 0 {
            f64::from(ch.time) / f64::from(trt)
        } else {
            0.0
        };
        let tc = TimeCode::new(
            scrub,
            ch.time,
            trt,
            ch.preset,
            ch.preset.is_some() && ch.preset == selected,
        );
        Reply::ok(tc.encode().to_vec())
    }

    fn media_state(&self) -> MediaState {
        let active = self.channels.iter().filter_map(|ch| ch.preset.map(|p| (p, ch.paused)));
        let mut playing = Vec::new();
        let mut paused = Vec::new();
        for (preset, is_paused) in active {
            let list = if is_paused { &mut paused } else { &mut playing };
            if !list.contains(&preset) {
                list.push(preset);
            }
        }
        MediaState {
            preset_count: self.presets.len() as u32,
            selected: self.selected,
            playing,
            paused,
        }
    }

    fn preset_list(&self) -> PresetList {
        let state = self.media_state();
        let presets = self
            .presets
            .iter()
            .enumerate()
            .map(|(index, &key)| PresetInfo {
                key,
                index: index as i32,
                name: format!("Preset {key}"),
                playing: state.is_playing(key),
                paused: state.is_paused(key),
                selected: self.selected == Some(key),
            })
            .collect();
        PresetList { presets }
    }

    fn eject(&mut self, disk: &str) -> Reply {
        match self.disks.iter().position(|d| d == disk) {
            Some(index) => {
                self.disks.remove(index);
                Reply::ok(Vec::new())
            }
            None => Reply::status(STATUS_FAILED),
        }
    }

    fn set_mode(&mut self, mode: HardwareMode) -> Reply {
        if !self.initialized {
            return Reply::status(STATUS_FAILED);
        }
        self.mode = Some(mode);
        Reply::ok(Vec::new())
    }

    fn initialize(&mut self, mode: HardwareMode) -> Reply {
        self.initialized = true;
        self.mode = Some(mode);
        Reply::ok(Vec::new())
    }

    fn reset_playback(&mut self) {
        for ch in &mut self.channels {
            *ch = Channel::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use coyote_core::protocol::{RefreshRate, Resolution};

    use super::*;

    fn device() -> SimDevice {
        SimDevice::new(&DeviceConfig::default())
    }

    fn send<P: Payload>(dev: &mut SimDevice, command: Command, payload: P) -> Reply {
        dev.handle(command, &payload.to_bytes().unwrap()).unwrap()
    }

    fn bare(dev: &mut SimDevice, command: Command) -> Reply {
        dev.handle(command, &[]).unwrap()
    }

    #[test]
    fn hello_reports_channels() {
        let mut dev = device();
        let reply = send(&mut dev, Command::Hello, ClientHello::new("test"));
        let info = DeviceInfo::from_bytes(&reply.body).unwrap();
        assert_eq!(info.channel_count, 4);
        assert_eq!(info.nickname, "coyote-sim");
    }

    #[test]
    fn selection_cycles_through_presets() {
        let mut dev = device();
        let keys: Vec<_> = (0..4)
            .map(|_| {
                let reply = bare(&mut dev, Command::SelectNext);
                SelectionReply::from_bytes(&reply.body).unwrap().selected
            })
            .collect();
        assert_eq!(keys, vec![Some(1), Some(2), Some(3), Some(1)]);

        let reply = bare(&mut dev, Command::SelectPrev);
        assert_eq!(SelectionReply::from_bytes(&reply.body).unwrap().selected, Some(3));
    }

    #[test]
    fn take_requires_a_selection() {
        let mut dev = device();
        let reply = send(&mut dev, Command::Take, ChannelRequest { channel: 1 });
        assert_eq!(reply.status, STATUS_FAILED);

        send(&mut dev, Command::SelectPreset, PresetRequest { key: 2 });
        let reply = send(&mut dev, Command::Take, ChannelRequest { channel: 1 });
        assert_eq!(reply.status, STATUS_OK);
        assert_eq!(dev.media_state().playing, vec![2]);
    }

    #[test]
    fn seek_and_timecode() {
        let mut dev = device();
        send(&mut dev, Command::SelectPreset, PresetRequest { key: 1 });
        send(&mut dev, Command::Take, ChannelRequest { channel: 3 });
        let reply = send(&mut dev, Command::SeekTo, SeekRequest { channel: 3, time: 15_000 });
        assert_eq!(reply.status, STATUS_OK);

        let reply = send(&mut dev, Command::GetTimeCode, ChannelRequest { channel: 3 });
        let tc = TimeCode::decode(&reply.body).unwrap();
        assert_eq!(tc.time(), 15_000);
        assert_eq!(tc.scrub(), 0.25);
        assert_eq!(tc.preset_key(), Some(1));
        assert!(tc.is_selected());

        let reply = send(&mut dev, Command::SeekTo, SeekRequest { channel: 3, time: 60_001 });
        assert_eq!(reply.status, STATUS_MISUSED);
    }

    #[test]
    fn deleting_selected_preset_clears_selection_and_playback() {
        let mut dev = device();
        send(&mut dev, Command::SelectPreset, PresetRequest { key: 3 });
        send(&mut dev, Command::Take, ChannelRequest { channel: 1 });
        let reply = send(&mut dev, Command::DeletePreset, PresetRequest { key: 3 });
        assert_eq!(reply.status, STATUS_OK);
        assert_eq!(dev.selected(), None);
        assert!(dev.media_state().playing.is_empty());

        let reply = send(&mut dev, Command::DeletePreset, PresetRequest { key: 3 });
        assert_eq!(reply.status, STATUS_FAILED);
    }

    #[test]
    fn preset_listing_follows_playlist() {
        let mut dev = device();
        send(&mut dev, Command::SelectPreset, PresetRequest { key: 2 });
        send(&mut dev, Command::Take, ChannelRequest { channel: 1 });

        let reply = bare(&mut dev, Command::GetPresets);
        let list = PresetList::from_bytes(&reply.body).unwrap();
        let keys: Vec<_> = list.presets.iter().map(|p| p.key).collect();
        assert_eq!(keys, vec![1, 2, 3]);
        let selected = list.selected().unwrap();
        assert_eq!(selected.key, 2);
        assert!(selected.playing);
        assert_eq!(selected.name, "Preset 2");
    }

    #[test]
    fn hardware_mode_needs_initialization() {
        let mut dev = device();
        let mode = HardwareMode::new(Resolution::P1080, RefreshRate::Hz50);
        assert_eq!(send(&mut dev, Command::SetHardwareMode, mode).status, STATUS_FAILED);
        assert_eq!(send(&mut dev, Command::InitializeCoyote, mode).status, STATUS_OK);
        assert_eq!(send(&mut dev, Command::SetHardwareMode, mode).status, STATUS_OK);
    }

    #[test]
    fn power_commands_close_the_link() {
        let mut dev = device();
        assert!(bare(&mut dev, Command::Reboot).last);
        assert!(bare(&mut dev, Command::Shutdown).last);
        assert!(!bare(&mut dev, Command::RestartService).last);
        assert!(dev.handle(Command::Goodbye, &[]).is_none());
    }

    #[test]
    fn garbage_payload_is_misuse() {
        let mut dev = device();
        assert_eq!(dev.handle(Command::Take, &[1]).unwrap().status, STATUS_MISUSED);
    }
}
