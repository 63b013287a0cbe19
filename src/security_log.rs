//! Security event logging for audit trails.
//!
//! Authentication attempts, host key decisions, and session lifecycle
//! transitions are logged with `target: "security"` so they can be filtered
//! separately from operational output:
//!
//! ```bash
//! RUST_LOG=security=info sftp-relay
//! ```
//!
//! Passwords and session ids never appear in these events.

use tracing::{info, warn};

/// Log an SSH authentication attempt.
///
/// Called before attempting to authenticate with a remote host.
pub fn log_auth_attempt(host: &str, port: u16, username: &str, method: &str) {
    info!(
        target: "security",
        event = "auth_attempt",
        host = %host,
        port = port,
        username = %username,
        method = %method,
        "SSH authentication attempt"
    );
}

pub fn log_auth_success(host: &str, port: u16, username: &str, method: &str) {
    info!(
        target: "security",
        event = "auth_success",
        host = %host,
        port = port,
        username = %username,
        method = %method,
        "SSH authentication succeeded"
    );
}

pub fn log_auth_failure(host: &str, port: u16, username: &str, method: &str, reason: &str) {
    warn!(
        target: "security",
        event = "auth_failure",
        host = %host,
        port = port,
        username = %username,
        method = %method,
        reason = %reason,
        "SSH authentication failed"
    );
}

/// Log a host key accepted without a known_hosts entry.
pub fn log_host_key_accepted(host: &str, port: u16, fingerprint: &str) {
    info!(
        target: "security",
        event = "host_key_accepted",
        host = %host,
        port = port,
        fingerprint = %fingerprint,
        "Accepted host key without verification"
    );
}

pub fn log_host_key_rejected(host: &str, port: u16, reason: &str) {
    warn!(
        target: "security",
        event = "host_key_rejected",
        host = %host,
        port = port,
        reason = %reason,
        "Rejected host key"
    );
}

/// Log a login refused because the registry is full.
pub fn log_capacity_rejected(host: &str, port: u16, max: usize) {
    warn!(
        target: "security",
        event = "capacity_rejected",
        host = %host,
        port = port,
        max_sessions = max,
        "Session limit reached, login refused"
    );
}

pub fn log_session_created(host: &str, port: u16, username: &str) {
    info!(
        target: "security",
        event = "session_created",
        host = %host,
        port = port,
        username = %username,
        "SFTP session established"
    );
}

/// Log a session teardown. `reason` is one of logout, expired, overflow,
/// or shutdown.
pub fn log_session_closed(host: &str, port: u16, username: &str, reason: &str) {
    info!(
        target: "security",
        event = "session_closed",
        host = %host,
        port = port,
        username = %username,
        reason = %reason,
        "SFTP session closed"
    );
}
