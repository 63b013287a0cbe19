//! Session registry: id → session map with capacity and expiry enforcement.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::SessionError;
use crate::remote::{Connector, Credentials, RemoteFs};
use crate::security_log;
use crate::validation;

use super::id::unique_id;
use super::record::{CloseReason, Session};
use super::sweeper::{self, SweeperHandle};
use super::{SessionId, SessionSettings};

/// Counts reported for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Sessions that are open and not past their idle timeout.
    pub active: usize,
    /// Every record currently held, including expired ones awaiting a sweep.
    pub total: usize,
    pub max: usize,
}

/// Process-wide owner of every live session.
///
/// Constructed at startup, shared as `Arc<SessionRegistry>`, and torn down
/// with [`SessionRegistry::shutdown`]. The map lock is never held across an
/// `.await`; connection closes always happen after it is released.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    connector: Arc<dyn Connector>,
    settings: SessionSettings,
    sweeper: parking_lot::Mutex<Option<SweeperHandle>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.read().len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn Connector>, settings: SessionSettings) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            connector,
            settings,
            sweeper: parking_lot::Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Start the background expiry sweeper. Calling it twice is a no-op.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut slot = self.sweeper.lock();
        if slot.is_none() {
            *slot = Some(sweeper::spawn(
                Arc::downgrade(self),
                self.settings.cleanup_interval,
            ));
        }
    }

    /// Authenticate a new connection and register a session for it.
    pub async fn create(&self, credentials: Credentials) -> Result<Arc<Session>, SessionError> {
        validation::validate_login(&credentials)?;

        let max = self.settings.max_sessions;
        // Optimistic check so a full registry does not pay for a handshake.
        // Authoritative check happens again under the write lock.
        let current = self.sessions.read().len();
        if current >= max && self.expired_count() == 0 {
            security_log::log_capacity_rejected(&credentials.host, credentials.port, max);
            return Err(SessionError::CapacityExceeded { max });
        }

        security_log::log_auth_attempt(
            &credentials.host,
            credentials.port,
            &credentials.username,
            "password",
        );
        let fs = match self
            .connector
            .connect(&credentials, self.settings.connect_timeout)
            .await
        {
            Ok(fs) => fs,
            Err(e) => {
                security_log::log_auth_failure(
                    &credentials.host,
                    credentials.port,
                    &credentials.username,
                    "password",
                    &e.to_string(),
                );
                return Err(e.into());
            }
        };
        security_log::log_auth_success(
            &credentials.host,
            credentials.port,
            &credentials.username,
            "password",
        );

        let home_dir = resolve_home_dir(fs.as_ref(), &credentials.username).await;
        self.insert(credentials, home_dir, fs).await
    }

    async fn insert(
        &self,
        credentials: Credentials,
        home_dir: String,
        fs: Box<dyn RemoteFs>,
    ) -> Result<Arc<Session>, SessionError> {
        let max = self.settings.max_sessions;
        let mut evicted = Vec::new();

        let outcome = {
            let mut sessions = self.sessions.write();

            if sessions.len() >= max {
                let timeout = self.settings.timeout;
                sessions.retain(|_, session| {
                    if session.is_expired(timeout) {
                        evicted.push(session.clone());
                        false
                    } else {
                        true
                    }
                });
            }

            if sessions.len() >= max {
                Err(fs)
            } else {
                let id = unique_id(|id| sessions.contains_key(id), SessionId::generate);
                let session = Session::new(
                    id.clone(),
                    credentials.host.clone(),
                    credentials.port,
                    credentials.username.clone(),
                    home_dir,
                    fs,
                );
                sessions.insert(id, session.clone());
                Ok(session)
            }
        };

        join_all(
            evicted
                .iter()
                .map(|session| session.close_or_defer(CloseReason::Overflow)),
        )
        .await;
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "Evicted expired sessions to make room");
        }

        match outcome {
            Ok(session) => {
                security_log::log_session_created(
                    &credentials.host,
                    credentials.port,
                    &credentials.username,
                );
                tracing::debug!(session = ?session.id(), home = %session.home_dir(), "Session created");
                Ok(session)
            }
            Err(fs) => {
                // Lost the race for the last slot: the new handle is ours to close.
                if let Err(e) = fs.close().await {
                    tracing::warn!("Failed to close rejected connection: {}", e);
                }
                security_log::log_capacity_rejected(&credentials.host, credentials.port, max);
                Err(SessionError::CapacityExceeded { max })
            }
        }
    }

    /// Look up a live session and refresh its access time.
    pub fn get(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        let sessions = self.sessions.read();
        let session = sessions.get(id).ok_or(SessionError::NotFound)?;

        if !session.is_active() {
            return Err(SessionError::NotFound);
        }
        // The sweeper needs the write lock to remove this record, so it
        // cannot evict between the staleness check and the refresh.
        if !session.touch_if_fresh(self.settings.timeout) {
            return Err(SessionError::Expired);
        }

        Ok(session.clone())
    }

    /// Remove a session and close its connection.
    pub async fn delete(&self, id: &str) -> Result<(), SessionError> {
        let session = self
            .sessions
            .write()
            .remove(id)
            .ok_or(SessionError::NotFound)?;

        session.close(CloseReason::Logout).await;
        Ok(())
    }

    /// Sessions that are not past their idle timeout.
    pub fn list(&self) -> Vec<Arc<Session>> {
        let timeout = self.settings.timeout;
        self.sessions
            .read()
            .values()
            .filter(|s| s.is_active() && !s.is_expired(timeout))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> SessionStats {
        let sessions = self.sessions.read();
        let timeout = self.settings.timeout;
        SessionStats {
            active: sessions
                .values()
                .filter(|s| s.is_active() && !s.is_expired(timeout))
                .count(),
            total: sessions.len(),
            max: self.settings.max_sessions,
        }
    }

    fn expired_count(&self) -> usize {
        let timeout = self.settings.timeout;
        self.sessions
            .read()
            .values()
            .filter(|s| s.is_expired(timeout))
            .count()
    }

    /// Evict every session idle for at least the timeout and close it.
    ///
    /// Staleness is decided under the write lock, so a session refreshed by
    /// a concurrent `get` before the lock was taken survives this run.
    /// Closes run after the lock is released. A session whose connection
    /// is still held, for example by an open download, is closed in the
    /// background once released, so one busy session never stalls the rest.
    pub async fn sweep_expired(&self) -> usize {
        let timeout = self.settings.timeout;
        let mut expired = Vec::new();
        self.sessions.write().retain(|_, session| {
            if session.is_expired(timeout) {
                expired.push(session.clone());
                false
            } else {
                true
            }
        });

        join_all(
            expired
                .iter()
                .map(|session| session.close_or_defer(CloseReason::Expired)),
        )
        .await;

        expired.len()
    }

    /// Stop the sweeper and close every session. Waits for in-flight
    /// operations to release their connections.
    pub async fn shutdown(&self) {
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
        }

        let drained: Vec<Arc<Session>> = self
            .sessions
            .write()
            .drain()
            .map(|(_, session)| session)
            .collect();

        join_all(
            drained
                .iter()
                .map(|session| session.close(CloseReason::Shutdown)),
        )
        .await;
        tracing::info!(count = drained.len(), "Session registry shut down");
    }
}

/// Best-effort home directory: reported working directory, else a
/// conventional home path that exists, else the root.
async fn resolve_home_dir(fs: &dyn RemoteFs, username: &str) -> String {
    match fs.working_dir().await {
        Ok(dir) if !dir.trim().is_empty() => return dir,
        Ok(_) => {}
        Err(e) => tracing::debug!("Working directory unavailable, probing home paths: {}", e),
    }

    let mut candidates = vec![format!("/home/{}", username), format!("/Users/{}", username)];
    if username == "root" {
        candidates.insert(0, "/root".to_string());
    }

    for candidate in candidates {
        if let Ok(metadata) = fs.stat(&candidate).await {
            if metadata.is_dir {
                return candidate;
            }
        }
    }

    "/".to_string()
}
