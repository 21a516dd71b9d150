//! In-flight request tracking for a link.

use std::time::{Duration, Instant};

use crate::message::Command;

/// Hands out request ids for one link: non-zero, strictly increasing,
/// never reused for the lifetime of the link (including reconnects).
#[derive(Debug)]
pub struct RequestIds {
    next: u64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next = self.next.checked_add(1).unwrap_or(1);
        id
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

/// The one request a link has outstanding.
#[derive(Debug, Clone)]
pub struct TrackedRequest {
    pub request_id: u64,
    pub command: Command,
    /// When the request was created.
    pub created_at: Instant,
    /// When the frame was handed to the transport; `None` until then.
    pub sent_at: Option<Instant>,
}

impl TrackedRequest {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            command,
            created_at: Instant::now(),
            sent_at: None,
        }
    }

    pub fn mark_sent(&mut self) {
        self.sent_at = Some(Instant::now());
    }

    pub fn was_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    /// Abandoning this request leaves the device state unknown: it was
    /// transmitted and it mutates the device.
    pub fn is_ambiguous(&self) -> bool {
        self.was_sent() && !self.command.is_idempotent()
    }

    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }
}
