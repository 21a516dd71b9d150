//! Preset selection with an advisory per-session cache.
//!
//! The device owns the selection. The cache remembers the last key this
//! session saw selected and when, so displays can skip a round trip.
//! Anything that mutates based on the selection asks the device unless a
//! staleness window is configured and the cache is inside it.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::dispatcher::{decode, preset_request};
use crate::error::{CoyoteError, Target};
use crate::message::Command;
use crate::protocol::{MediaState, Payload, SelectionReply};
use crate::session::{Session, SessionId, SessionManager};

/// What the caller intends to do with a selection lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Showing it to someone; a cached answer is fine.
    Display,
    /// Acting on it; only a recent enough cached answer is acceptable.
    Mutation,
}

/// A selection as last observed by this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub key: i32,
    pub observed_at: Instant,
}

impl Selection {
    pub fn age(&self) -> Duration {
        self.observed_at.elapsed()
    }
}

impl SessionManager {
    /// Move the selection forward; returns the key now selected.
    pub async fn select_next(&self, id: SessionId) -> Result<Option<i32>, CoyoteError> {
        self.step_selection(id, Command::SelectNext).await
    }

    /// Move the selection back; returns the key now selected.
    pub async fn select_prev(&self, id: SessionId) -> Result<Option<i32>, CoyoteError> {
        self.step_selection(id, Command::SelectPrev).await
    }

    pub async fn select_preset(&self, id: SessionId, key: i32) -> Result<(), CoyoteError> {
        let session = self.session(id)?;
        let command = Command::SelectPreset;
        let payload = preset_request(command, key)?;
        match self
            .call(&session, command, payload, Target::Preset(key), None)
            .await
        {
            Ok(_) => {
                session.set_selection(Some(key));
                Ok(())
            }
            Err(e) => Err(forget_selection(&session, e)),
        }
    }

    /// The cached selection, without contacting the device.
    pub fn cached_selection(&self, id: SessionId) -> Result<Option<Selection>, CoyoteError> {
        let session = self.session(id)?;
        Ok(session.cached_selection())
    }

    /// The selected preset key, from cache or device depending on
    /// `freshness` and the configured staleness window.
    pub async fn current_selection(
        &self,
        id: SessionId,
        freshness: Freshness,
    ) -> Result<Option<i32>, CoyoteError> {
        let session = self.session(id)?;
        if let Some(cached) = session.cached_selection() {
            let usable = match freshness {
                Freshness::Display => true,
                Freshness::Mutation => self
                    .config()
                    .selection_staleness()
                    .is_some_and(|window| cached.age() < window),
            };
            if usable {
                return Ok(Some(cached.key));
            }
        }

        let command = Command::GetMediaState;
        let body = self
            .call(&session, command, Vec::new(), Target::None, None)
            .await?;
        let state: MediaState = decode(command, Target::None, MediaState::from_bytes(&body))?;
        session.set_selection(state.selected);
        Ok(state.selected)
    }

    /// Delete whichever preset is selected right now.
    pub async fn delete_selected_preset(&self, id: SessionId) -> Result<i32, CoyoteError> {
        let Some(key) = self.current_selection(id, Freshness::Mutation).await? else {
            return Err(CoyoteError::invalid(
                Command::DeletePreset.name(),
                Target::None,
                "no preset is selected",
            ));
        };
        self.delete_preset(id, key).await?;
        Ok(key)
    }

    async fn step_selection(&self, id: SessionId, command: Command) -> Result<Option<i32>, CoyoteError> {
        let session = self.session(id)?;
        let body = match self
            .call(&session, command, Vec::new(), Target::None, None)
            .await
        {
            Ok(body) => body,
            Err(e) => return Err(forget_selection(&session, e)),
        };
        // The device accepted the step, so an unreadable reply still
        // leaves the old key stale.
        let reply: SelectionReply =
            match decode(command, Target::None, SelectionReply::from_bytes(&body)) {
                Ok(reply) => reply,
                Err(e) => {
                    session.set_selection(None);
                    return Err(e);
                }
            };
        session.set_selection(reply.selected);
        Ok(reply.selected)
    }
}

/// After a refusal or an unknown outcome the real selection is unknown.
fn forget_selection(session: &Session, error: CoyoteError) -> CoyoteError {
    if matches!(
        error,
        CoyoteError::Device { .. } | CoyoteError::AmbiguousOutcome { .. }
    ) {
        debug!(session = %session.id, "selection cache cleared: {error}");
        session.set_selection(None);
    }
    error
}
