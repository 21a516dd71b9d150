//! Session manager: one control session, and one link, per device address.
//!
//! ```text
//! new_session(addr) ──► Link::open ──► SessionId
//!
//! command ──► [closed?] ──► link.lock() (FIFO) ──► [closed?] ──► request
//!                                                      │
//!                          destroy: cancel ◄───────────┘ select!
//! ```
//!
//! The session table sits behind a `std::sync::Mutex` that is never held
//! across an await, so sessions never wait on each other. Commands on one
//! session queue on its link mutex in arrival order.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{CoyoteError, Target, TransportErrorKind};
use crate::link::Link;
use crate::message::Command;
use crate::network::{Connector, TcpConnector};
use crate::packet::Packet;
use crate::protocol::DeviceInfo;
use crate::selection::Selection;

// ── SessionId ────────────────────────────────────────────────────

/// Opaque session handle. Issued monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Rebuild an id from its numeric value. An id that was never issued
    /// simply names no session.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

// ── Session ──────────────────────────────────────────────────────

pub(crate) struct Session {
    pub id: SessionId,
    pub address: String,
    link: AsyncMutex<Link>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    device: watch::Receiver<DeviceInfo>,
    selection: Mutex<Option<Selection>>,
}

impl Session {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.device.borrow().clone()
    }

    pub fn cached_selection(&self) -> Option<Selection> {
        self.selection.lock().ok().and_then(|guard| *guard)
    }

    pub fn set_selection(&self, key: Option<i32>) {
        if let Ok(mut guard) = self.selection.lock() {
            *guard = key.map(|key| Selection {
                key,
                observed_at: Instant::now(),
            });
        }
    }
}

enum Outcome {
    Done(Result<Packet, CoyoteError>),
    Cancelled,
    Expired,
}

// ── SessionManager ───────────────────────────────────────────────

/// Owns every live session. Cheap to share behind an `Arc`; all methods
/// take `&self`.
pub struct SessionManager {
    config: Arc<SessionConfig>,
    connector: Arc<dyn Connector>,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("sessions", &self.session_ids())
            .finish_non_exhaustive()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionManager {
    /// A manager that reaches devices over TCP.
    pub fn new(config: SessionConfig) -> Self {
        let connector = Arc::new(TcpConnector::new(config.default_port));
        Self::with_connector(config, connector)
    }

    pub fn with_connector(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a link to `address` (`host` or `host:port`, default port
    /// [`DEFAULT_PORT`](crate::config::DEFAULT_PORT) unless configured otherwise) and register a session.
    pub async fn new_session(&self, address: &str) -> Result<SessionId, CoyoteError> {
        let link = Link::open(address, Arc::clone(&self.connector), Arc::clone(&self.config)).await?;
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = Arc::new(Session {
            id,
            address: address.to_string(),
            device: link.device_info(),
            link: AsyncMutex::new(link),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            selection: Mutex::new(None),
        });
        self.table().insert(id, session);
        info!(session = %id, address, "session created");
        Ok(id)
    }

    /// Tear down a session. New and queued commands fail with
    /// [`CoyoteError::SessionClosed`]; an in-flight command gets up to the
    /// configured destroy timeout before it is cancelled. The link is
    /// always closed.
    pub async fn destroy_session(&self, id: SessionId) -> Result<(), CoyoteError> {
        let session = self
            .table()
            .remove(&id)
            .ok_or(CoyoteError::SessionClosed(id))?;
        session.closed.store(true, Ordering::Release);

        let wait = self.config.destroy_timeout();
        let mut link = match time::timeout(wait, session.link.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                warn!(session = %id, ?wait, "in-flight command did not finish; cancelling");
                session.shutdown.cancel();
                session.link.lock().await
            }
        };
        session.shutdown.cancel();
        link.close().await;
        info!(session = %id, address = %session.address, "session destroyed");
        Ok(())
    }

    /// Destroy every session.
    pub async fn shutdown(&self) {
        for id in self.session_ids() {
            if let Err(e) = self.destroy_session(id).await {
                debug!(session = %id, "shutdown: {e}");
            }
        }
    }

    /// Live session ids, ascending.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.table().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn address(&self, id: SessionId) -> Result<String, CoyoteError> {
        Ok(self.session(id)?.address.clone())
    }

    /// What the device reported at the most recent handshake.
    pub fn device_info(&self, id: SessionId) -> Result<DeviceInfo, CoyoteError> {
        Ok(self.session(id)?.device_info())
    }

    // ── Internals shared by the command modules ──────────────────

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn session(&self, id: SessionId) -> Result<Arc<Session>, CoyoteError> {
        self.table()
            .get(&id)
            .filter(|s| !s.is_closed())
            .cloned()
            .ok_or(CoyoteError::SessionClosed(id))
    }

    /// Run one request on the session's link, in FIFO order with other
    /// commands on the same session.
    pub(crate) async fn execute(
        &self,
        session: &Session,
        command: Command,
        payload: Vec<u8>,
        target: Target,
        deadline: Option<Duration>,
    ) -> Result<Packet, CoyoteError> {
        let closed = || CoyoteError::SessionClosed(session.id);
        if session.is_closed() {
            return Err(closed());
        }

        // The caller's deadline also covers the wait behind queued commands.
        let deadline = deadline.map(|after| time::Instant::now() + after);
        let mut link = tokio::select! {
            guard = session.link.lock() => guard,
            _ = session.shutdown.cancelled() => return Err(closed()),
            _ = expire(deadline) => {
                return Err(CoyoteError::Transport {
                    op: command.name(),
                    target,
                    kind: TransportErrorKind::Timeout,
                });
            }
        };
        if session.is_closed() {
            return Err(closed());
        }

        let outcome = tokio::select! {
            result = link.request(command, payload, &target) => Outcome::Done(result),
            _ = session.shutdown.cancelled() => Outcome::Cancelled,
            _ = expire(deadline) => Outcome::Expired,
        };

        match outcome {
            Outcome::Done(result) => result,
            Outcome::Cancelled => match link.abandon().await {
                Some(req) if req.is_ambiguous() => Err(CoyoteError::AmbiguousOutcome {
                    op: command.name(),
                    target,
                }),
                _ => Err(closed()),
            },
            Outcome::Expired => match link.abandon().await {
                Some(req) if req.is_ambiguous() => Err(CoyoteError::AmbiguousOutcome {
                    op: command.name(),
                    target,
                }),
                _ => Err(CoyoteError::Transport {
                    op: command.name(),
                    target,
                    kind: TransportErrorKind::Timeout,
                }),
            },
        }
    }
}

fn expire(deadline: Option<time::Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(at) => time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}
