//! Session record: one exclusively owned connection plus its metadata.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tokio::time::Instant;

use crate::remote::RemoteFs;
use crate::security_log;

use super::SessionId;

/// Why a session's connection is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Logout,
    Expired,
    Overflow,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Logout => "logout",
            CloseReason::Expired => "expired",
            CloseReason::Overflow => "overflow",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

/// Connection slot guarded by the per-session lock.
///
/// The handle stays in place after close so guards can deref it without
/// an `Option`; `closed` is only flipped while the lock is held and no guard
/// is ever handed out once it is set.
struct ConnectionSlot {
    fs: Box<dyn RemoteFs>,
    closed: bool,
}

/// Exclusive access to a session's connection for the lifetime of the guard.
pub struct ConnectionGuard<'a>(MutexGuard<'a, ConnectionSlot>);

impl Deref for ConnectionGuard<'_> {
    type Target = dyn RemoteFs;

    fn deref(&self) -> &Self::Target {
        self.0.fs.as_ref()
    }
}

/// Owned variant of [`ConnectionGuard`], for streams that outlive the call
/// that opened them.
pub struct OwnedConnectionGuard(OwnedMutexGuard<ConnectionSlot>);

impl Deref for OwnedConnectionGuard {
    type Target = dyn RemoteFs;

    fn deref(&self) -> &Self::Target {
        self.0.fs.as_ref()
    }
}

/// Diagnostic snapshot of a session, safe to hand to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub home_dir: String,
    pub created_at: DateTime<Utc>,
    pub idle_secs: u64,
}

/// A bound, time-limited ownership record for one remote connection.
pub struct Session {
    id: SessionId,
    host: String,
    port: u16,
    username: String,
    home_dir: String,
    created_at: DateTime<Utc>,
    last_access: parking_lot::Mutex<Instant>,
    active: AtomicBool,
    connection: Arc<Mutex<ConnectionSlot>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("home_dir", &self.home_dir)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        host: String,
        port: u16,
        username: String,
        home_dir: String,
        fs: Box<dyn RemoteFs>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            host,
            port,
            username,
            home_dir,
            created_at: Utc::now(),
            last_access: parking_lot::Mutex::new(Instant::now()),
            active: AtomicBool::new(true),
            connection: Arc::new(Mutex::new(ConnectionSlot { fs, closed: false })),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Initial working directory resolved when the session was created.
    pub fn home_dir(&self) -> &str {
        &self.home_dir
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn idle_time(&self) -> Duration {
        self.last_access.lock().elapsed()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            home_dir: self.home_dir.clone(),
            created_at: self.created_at,
            idle_secs: self.idle_time().as_secs(),
        }
    }

    pub(crate) fn is_expired(&self, timeout: Duration) -> bool {
        self.idle_time() >= timeout
    }

    /// Refresh the access time unless the session already went stale.
    /// Check and refresh happen under one acquisition of the record lock.
    pub(crate) fn touch_if_fresh(&self, timeout: Duration) -> bool {
        let mut last_access = self.last_access.lock();
        if last_access.elapsed() >= timeout {
            return false;
        }
        *last_access = Instant::now();
        true
    }

    /// Refresh the access time from inside a long-running operation.
    pub(crate) fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    /// Wait for exclusive use of the connection. `None` once closed.
    pub async fn connection(&self) -> Option<ConnectionGuard<'_>> {
        let slot = self.connection.lock().await;
        if slot.closed {
            return None;
        }
        Some(ConnectionGuard(slot))
    }

    pub async fn connection_owned(&self) -> Option<OwnedConnectionGuard> {
        let slot = self.connection.clone().lock_owned().await;
        if slot.closed {
            return None;
        }
        Some(OwnedConnectionGuard(slot))
    }

    /// Close the connection. Waits for any in-flight operation to release
    /// the connection lock first. Returns `false` if it was already closed.
    ///
    /// Close failures are logged and swallowed: the record is torn down
    /// regardless.
    pub(crate) async fn close(&self, reason: CloseReason) -> bool {
        let mut slot = self.connection.lock().await;
        self.close_slot(&mut slot, reason).await
    }

    /// Close right away when the connection is idle. When an operation or an
    /// open download still holds it, mark the record inactive and leave the
    /// close to a background task that waits for the holder.
    pub(crate) async fn close_or_defer(self: &Arc<Self>, reason: CloseReason) {
        if let Ok(mut slot) = self.connection.try_lock() {
            self.close_slot(&mut slot, reason).await;
            return;
        }

        self.active.store(false, Ordering::SeqCst);
        tracing::debug!(
            session = ?self.id,
            reason = reason.as_str(),
            "Connection busy, closing once released"
        );
        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.close(reason).await;
        });
    }

    async fn close_slot(&self, slot: &mut ConnectionSlot, reason: CloseReason) -> bool {
        if slot.closed {
            return false;
        }
        slot.closed = true;
        self.active.store(false, Ordering::SeqCst);

        if let Err(e) = slot.fs.close().await {
            tracing::warn!(
                session = ?self.id,
                host = %self.host,
                reason = reason.as_str(),
                "Failed to close remote connection cleanly: {}",
                e
            );
        }
        security_log::log_session_closed(&self.host, self.port, &self.username, reason.as_str());
        true
    }
}
