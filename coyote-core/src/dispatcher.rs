//! Playback control and read-only queries.
//!
//! Each operation validates its arguments locally, encodes one request,
//! and maps the response: status `0` is success, anything else is handed
//! back untouched as [`CoyoteError::Device`].

use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{CoyoteError, Target, TransportErrorKind};
use crate::message::Command;
use crate::packet::Packet;
use crate::protocol::{
    ChannelRequest, DiskList, HardwareState, MediaState, Payload, PresetInfo, PresetList,
    PresetRequest, SeekRequest, ServerVersion, TimeCode,
};
use crate::session::{Session, SessionId, SessionManager};

/// Device status meaning success.
pub const STATUS_OK: i32 = 0;

impl SessionManager {
    // ── Internals ────────────────────────────────────────────────

    /// Send one command and check its status, returning the response
    /// payload.
    pub(crate) async fn call(
        &self,
        session: &Session,
        command: Command,
        payload: Vec<u8>,
        target: Target,
        deadline: Option<Duration>,
    ) -> Result<Vec<u8>, CoyoteError> {
        let response = self
            .execute(session, command, payload, target.clone(), deadline)
            .await?;
        check_status(command, target, response)
    }

    async fn control(
        &self,
        id: SessionId,
        command: Command,
        payload: Vec<u8>,
        target: Target,
    ) -> Result<(), CoyoteError> {
        let session = self.session(id)?;
        self.call(&session, command, payload, target, None).await?;
        Ok(())
    }

    async fn query<T: Payload>(&self, id: SessionId, command: Command) -> Result<T, CoyoteError> {
        let session = self.session(id)?;
        let body = self.call(&session, command, Vec::new(), Target::None, None).await?;
        decode(command, Target::None, T::from_bytes(&body))
    }

    fn channel_request(
        &self,
        session: &Session,
        command: Command,
        channel: i32,
    ) -> Result<Vec<u8>, CoyoteError> {
        check_channel(session, command, channel, &Target::Channel(channel))?;
        encode(command, Target::Channel(channel), ChannelRequest { channel }.to_bytes())
    }

    async fn channel_control(
        &self,
        id: SessionId,
        command: Command,
        channel: i32,
    ) -> Result<(), CoyoteError> {
        let session = self.session(id)?;
        let payload = self.channel_request(&session, command, channel)?;
        self.call(&session, command, payload, Target::Channel(channel), None)
            .await?;
        Ok(())
    }

    // ── Playback ─────────────────────────────────────────────────

    /// Begin playback on `channel`.
    pub async fn take(&self, id: SessionId, channel: i32) -> Result<(), CoyoteError> {
        self.channel_control(id, Command::Take, channel).await
    }

    /// Stop playback on `channel`.
    pub async fn end(&self, id: SessionId, channel: i32) -> Result<(), CoyoteError> {
        self.channel_control(id, Command::End, channel).await
    }

    pub async fn pause(&self, id: SessionId, channel: i32) -> Result<(), CoyoteError> {
        self.channel_control(id, Command::Pause, channel).await
    }

    /// Advance the active channel's take.
    pub async fn take_next(&self, id: SessionId) -> Result<(), CoyoteError> {
        self.control(id, Command::TakeNext, Vec::new(), Target::None)
            .await
    }

    pub async fn take_prev(&self, id: SessionId) -> Result<(), CoyoteError> {
        self.control(id, Command::TakePrev, Vec::new(), Target::None)
            .await
    }

    /// Move `channel` to `time`. Callers keep `time` within the media's
    /// running time; the device rejects anything else with a status code.
    pub async fn seek_to(&self, id: SessionId, channel: i32, time: u32) -> Result<(), CoyoteError> {
        let session = self.session(id)?;
        let target = Target::Seek { channel, time };
        check_channel(&session, Command::SeekTo, channel, &target)?;
        let payload = encode(Command::SeekTo, target.clone(), SeekRequest { channel, time }.to_bytes())?;
        self.call(&session, Command::SeekTo, payload, target, None)
            .await?;
        Ok(())
    }

    // ── Presets ──────────────────────────────────────────────────

    /// Delete preset `key`. Irreversible; there is no confirmation step.
    pub async fn delete_preset(&self, id: SessionId, key: i32) -> Result<(), CoyoteError> {
        let session = self.session(id)?;
        let payload = preset_request(Command::DeletePreset, key)?;
        self.call(&session, Command::DeletePreset, payload, Target::Preset(key), None)
            .await?;
        if session.cached_selection().is_some_and(|cached| cached.key == key) {
            session.set_selection(None);
        }
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Current playback position of `channel`.
    pub async fn get_time_code(&self, id: SessionId, channel: i32) -> Result<TimeCode, CoyoteError> {
        self.time_code(id, channel, None).await
    }

    /// Like [`get_time_code`](Self::get_time_code), but gives up after
    /// `deadline`. Expiry yields a timeout transport error and leaves the
    /// session usable.
    pub async fn get_time_code_within(
        &self,
        id: SessionId,
        channel: i32,
        deadline: Duration,
    ) -> Result<TimeCode, CoyoteError> {
        self.time_code(id, channel, Some(deadline)).await
    }

    async fn time_code(
        &self,
        id: SessionId,
        channel: i32,
        deadline: Option<Duration>,
    ) -> Result<TimeCode, CoyoteError> {
        let session = self.session(id)?;
        let command = Command::GetTimeCode;
        let payload = self.channel_request(&session, command, channel)?;
        let body = self
            .call(&session, command, payload, Target::Channel(channel), deadline)
            .await?;
        decode(command, Target::Channel(channel), TimeCode::decode(&body))
    }

    pub async fn get_media_state(&self, id: SessionId) -> Result<MediaState, CoyoteError> {
        self.query(id, Command::GetMediaState).await
    }

    pub async fn get_hardware_state(&self, id: SessionId) -> Result<HardwareState, CoyoteError> {
        self.query(id, Command::GetHardwareState).await
    }

    pub async fn get_server_version(&self, id: SessionId) -> Result<String, CoyoteError> {
        let reply: ServerVersion = self.query(id, Command::GetServerVersion).await?;
        Ok(reply.version)
    }

    /// The preset playlist with names and play state, for display.
    pub async fn get_presets(&self, id: SessionId) -> Result<Vec<PresetInfo>, CoyoteError> {
        let reply: PresetList = self.query(id, Command::GetPresets).await?;
        Ok(reply.presets)
    }

    /// Disk identifiers currently known to the device.
    pub async fn get_disks(&self, id: SessionId) -> Result<Vec<String>, CoyoteError> {
        let reply: DiskList = self.query(id, Command::GetDisks).await?;
        Ok(reply.disks)
    }

    /// Round-trip time of an empty request.
    pub async fn ping(&self, id: SessionId) -> Result<Duration, CoyoteError> {
        let session = self.session(id)?;
        let started = Instant::now();
        self.call(&session, Command::Ping, Vec::new(), Target::None, None)
            .await?;
        Ok(started.elapsed())
    }
}

// ── Helpers ──────────────────────────────────────────────────────

/// Channels are 1-based and bounded by the count reported at handshake.
fn check_channel(
    session: &Session,
    command: Command,
    channel: i32,
    target: &Target,
) -> Result<(), CoyoteError> {
    let info = session.device_info();
    if info.has_channel(channel) {
        return Ok(());
    }
    Err(CoyoteError::invalid(
        command.name(),
        target.clone(),
        format!("channel must be in 1..={}", info.channel_count),
    ))
}

fn check_status(command: Command, target: Target, response: Packet) -> Result<Vec<u8>, CoyoteError> {
    let status = response.status();
    trace!(op = command.name(), status, "response");
    if status != STATUS_OK {
        return Err(CoyoteError::Device {
            op: command.name(),
            target,
            code: status,
        });
    }
    Ok(response.into_payload())
}

pub(crate) fn preset_request(command: Command, key: i32) -> Result<Vec<u8>, CoyoteError> {
    if key < 0 {
        return Err(CoyoteError::invalid(
            command.name(),
            Target::Preset(key),
            "preset key must be non-negative",
        ));
    }
    encode(command, Target::Preset(key), PresetRequest { key }.to_bytes())
}

pub(crate) fn encode(
    command: Command,
    target: Target,
    bytes: Result<Vec<u8>, crate::error::ProtocolError>,
) -> Result<Vec<u8>, CoyoteError> {
    bytes.map_err(|e| CoyoteError::invalid(command.name(), target, e.to_string()))
}

pub(crate) fn decode<T>(
    command: Command,
    target: Target,
    value: Result<T, crate::error::ProtocolError>,
) -> Result<T, CoyoteError> {
    value.map_err(|e| {
        tracing::debug!(op = command.name(), "undecodable response: {e}");
        CoyoteError::Transport {
            op: command.name(),
            target,
            kind: TransportErrorKind::Malformed,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::ProtocolFlags;

    #[test]
    fn non_zero_status_passes_through() {
        let response = Packet::new_response(9, Command::Take, 4, Vec::new()).unwrap();
        let err = check_status(Command::Take, Target::Channel(2), response).unwrap_err();
        assert_eq!(err.device_code(), Some(4));
        assert!(err.to_string().contains("[channel 2]"));

        let negative = Packet::new_response(9, Command::End, -1, Vec::new()).unwrap();
        assert_eq!(
            check_status(Command::End, Target::None, negative)
                .unwrap_err()
                .device_code(),
            Some(-1)
        );
    }

    #[test]
    fn ok_status_returns_payload() {
        let response = Packet::new_response(3, Command::GetDisks, STATUS_OK, vec![1, 2, 3])
            .unwrap()
            .with_flags(ProtocolFlags::IDEMPOTENT);
        assert_eq!(
            check_status(Command::GetDisks, Target::None, response).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn negative_preset_key_rejected_locally() {
        let err = preset_request(Command::SelectPreset, -1).unwrap_err();
        assert!(matches!(err, CoyoteError::InvalidArgument { op: "SelectPreset", .. }));
        assert!(preset_request(Command::DeletePreset, 0).is_ok());
    }

    #[test]
    fn undecodable_reply_is_malformed() {
        let err = decode(
            Command::GetTimeCode,
            Target::Channel(1),
            TimeCode::decode(&[0u8; 3]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoyoteError::Transport {
                kind: TransportErrorKind::Malformed,
                ..
            }
        ));
    }
}
