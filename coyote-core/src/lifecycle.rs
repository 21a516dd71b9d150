//! Device lifecycle commands: power, service restart, disk eject, and
//! hardware mode setup.
//!
//! None of these are retried. Every call logs exactly one line, `info` on
//! success and `warn` on failure, and returns the error to the caller.
//! Reboot, soft reboot and shutdown answer with [`ProtocolFlags::FINAL`]
//! and then drop the connection; the next command on the session
//! reconnects.
//!
//! [`ProtocolFlags::FINAL`]: crate::flags::ProtocolFlags::FINAL

use tracing::{info, warn};

use crate::dispatcher::encode;
use crate::error::{CoyoteError, Target};
use crate::message::Command;
use crate::protocol::{EjectRequest, HardwareMode, Payload};
use crate::session::{SessionId, SessionManager};

impl SessionManager {
    /// Hard reboot of the unit.
    pub async fn reboot(&self, id: SessionId) -> Result<(), CoyoteError> {
        self.lifecycle(id, Command::Reboot, Target::None, || Ok(Vec::new()))
            .await
    }

    /// Restart the playback software without power cycling.
    pub async fn soft_reboot(&self, id: SessionId) -> Result<(), CoyoteError> {
        self.lifecycle(id, Command::SoftReboot, Target::None, || Ok(Vec::new()))
            .await
    }

    /// Power the unit off. Not to be confused with
    /// [`SessionManager::shutdown`], which only closes local sessions.
    pub async fn shutdown_device(&self, id: SessionId) -> Result<(), CoyoteError> {
        self.lifecycle(id, Command::Shutdown, Target::None, || Ok(Vec::new()))
            .await
    }

    /// Restart the control service on the unit.
    pub async fn restart_service(&self, id: SessionId) -> Result<(), CoyoteError> {
        self.lifecycle(id, Command::RestartService, Target::None, || Ok(Vec::new()))
            .await
    }

    /// Eject `disk`. The identifier must be non-blank and free of control
    /// characters.
    pub async fn eject_disk(&self, id: SessionId, disk: &str) -> Result<(), CoyoteError> {
        let command = Command::EjectDisk;
        let target = Target::Disk(disk.to_string());
        self.lifecycle(id, command, target.clone(), || {
            if disk.trim().is_empty() {
                return Err(CoyoteError::invalid(
                    command.name(),
                    target.clone(),
                    "disk identifier is empty",
                ));
            }
            if disk.chars().any(char::is_control) {
                return Err(CoyoteError::invalid(
                    command.name(),
                    target.clone(),
                    "disk identifier contains control characters",
                ));
            }
            encode(
                command,
                target.clone(),
                EjectRequest {
                    disk: disk.to_string(),
                }
                .to_bytes(),
            )
        })
        .await
    }

    /// Switch output mode. `resolution` and `refresh` are the raw device
    /// enumeration values and are checked before anything is sent.
    pub async fn set_hardware_mode(
        &self,
        id: SessionId,
        resolution: i32,
        refresh: i32,
    ) -> Result<(), CoyoteError> {
        self.mode_command(id, Command::SetHardwareMode, resolution, refresh)
            .await
    }

    /// One-time hardware setup into the given mode. Repeating it with the
    /// same mode is harmless on the device side.
    pub async fn initialize_coyote(
        &self,
        id: SessionId,
        resolution: i32,
        refresh: i32,
    ) -> Result<(), CoyoteError> {
        self.mode_command(id, Command::InitializeCoyote, resolution, refresh)
            .await
    }

    async fn mode_command(
        &self,
        id: SessionId,
        command: Command,
        resolution: i32,
        refresh: i32,
    ) -> Result<(), CoyoteError> {
        let target = Target::Mode { resolution, refresh };
        self.lifecycle(id, command, target.clone(), || {
            let mode = HardwareMode::from_raw(resolution, refresh)
                .map_err(|e| CoyoteError::invalid(command.name(), target.clone(), e.to_string()))?;
            encode(command, target.clone(), mode.to_bytes())
        })
        .await
    }

    async fn lifecycle<F>(
        &self,
        id: SessionId,
        command: Command,
        target: Target,
        build: F,
    ) -> Result<(), CoyoteError>
    where
        F: FnOnce() -> Result<Vec<u8>, CoyoteError>,
    {
        let result = self.send_once(id, command, target.clone(), build).await;
        match &result {
            Ok(()) => info!(
                session = %id,
                op = command.name(),
                subject = ?target,
                "lifecycle command accepted"
            ),
            Err(e) => warn!(
                session = %id,
                op = command.name(),
                subject = ?target,
                "lifecycle command failed: {e}"
            ),
        }
        result
    }

    async fn send_once<F>(
        &self,
        id: SessionId,
        command: Command,
        target: Target,
        build: F,
    ) -> Result<(), CoyoteError>
    where
        F: FnOnce() -> Result<Vec<u8>, CoyoteError>,
    {
        let session = self.session(id)?;
        let payload = build()?;
        self.call(&session, command, payload, target, None).await?;
        Ok(())
    }
}
