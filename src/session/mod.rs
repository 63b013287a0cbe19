//! Session lifecycle: registry, per-session records and the expiry sweeper.

mod id;
mod record;
mod registry;
mod sweeper;

use std::time::Duration;

pub use id::SessionId;
pub use record::{CloseReason, ConnectionGuard, OwnedConnectionGuard, Session, SessionInfo};
pub use registry::{SessionRegistry, SessionStats};
pub use sweeper::SweeperHandle;

/// Runtime knobs for the registry, decoupled from the config file so tests
/// can use sub-second durations.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Idle time after which a session is expired.
    pub timeout: Duration,
    /// Cadence of the background sweep.
    pub cleanup_interval: Duration,
    pub max_sessions: usize,
    /// Passed to the connector for each new connection.
    pub connect_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            cleanup_interval: Duration::from_secs(5 * 60),
            max_sessions: 100,
            connect_timeout: Duration::from_secs(30),
        }
    }
}
