use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::session::SessionSettings;
use crate::sftp::{ConnectSettings, HostKeyPolicy};
use crate::transfer::TransferSettings;

/// Environment variables that override file values, applied after loading.
pub const ENV_SESSION_TIMEOUT: &str = "SFTP_RELAY_SESSION_TIMEOUT";
pub const ENV_CLEANUP_INTERVAL: &str = "SFTP_RELAY_CLEANUP_INTERVAL";
pub const ENV_MAX_SESSIONS: &str = "SFTP_RELAY_MAX_SESSIONS";
pub const ENV_CONNECT_TIMEOUT: &str = "SFTP_RELAY_CONNECT_TIMEOUT";
pub const ENV_MAX_PREVIEW_BYTES: &str = "SFTP_RELAY_MAX_PREVIEW_BYTES";

const MIN_SESSION_TIMEOUT_SECS: u64 = 60;

/// Relay settings stored in config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

impl AppConfig {
    /// Load from the default location, writing defaults if the file does
    /// not exist yet. Env overrides and validation are applied.
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::paths::config_file().ok_or_else(|| ConfigError::ReadFile {
            path: PathBuf::from("config.toml"),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config file path",
            ),
        })?;

        if !path.exists() {
            let config = Self::default();
            if let Err(e) = config.save_to(&path) {
                tracing::warn!("Could not write default config: {}", e);
            }
            return config.finish();
        }

        Self::load_from(&path)?.finish()
    }

    /// Parse a config file without env overrides or validation.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(ConfigError::Parse)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            super::paths::ensure_dir(parent).map_err(ConfigError::CreateDir)?;
        }

        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(|e| ConfigError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn finish(mut self) -> Result<Self, ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())?;
        self.validate()?;
        Ok(self)
    }

    /// Apply overrides from `lookup`, normally the process environment.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = parse_env(&lookup, ENV_SESSION_TIMEOUT)? {
            self.session.timeout_secs = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_CLEANUP_INTERVAL)? {
            self.session.cleanup_interval_secs = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_MAX_SESSIONS)? {
            self.session.max_sessions = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_CONNECT_TIMEOUT)? {
            self.ssh.connection_timeout_secs = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_MAX_PREVIEW_BYTES)? {
            self.transfer.max_preview_bytes = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.timeout_secs < MIN_SESSION_TIMEOUT_SECS {
            return Err(ConfigError::Invalid {
                key: "session.timeout_secs",
                reason: format!("must be at least {} seconds", MIN_SESSION_TIMEOUT_SECS),
            });
        }
        if self.session.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "session.cleanup_interval_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.session.max_sessions == 0 {
            return Err(ConfigError::Invalid {
                key: "session.max_sessions",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.ssh.connection_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "ssh.connection_timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.ssh.host_key_policy == HostKeyCheck::KnownHosts
            && self.ssh.known_hosts_file.is_none()
        {
            return Err(ConfigError::Invalid {
                key: "ssh.known_hosts_file",
                reason: "required when host_key_policy is known_hosts".to_string(),
            });
        }
        if self.transfer.archive_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "transfer.archive_name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            timeout: Duration::from_secs(self.session.timeout_secs),
            cleanup_interval: Duration::from_secs(self.session.cleanup_interval_secs),
            max_sessions: self.session.max_sessions,
            connect_timeout: Duration::from_secs(self.ssh.connection_timeout_secs),
        }
    }

    pub fn connect_settings(&self) -> ConnectSettings {
        let host_key_policy = match (&self.ssh.host_key_policy, &self.ssh.known_hosts_file) {
            (HostKeyCheck::KnownHosts, Some(path)) => {
                HostKeyPolicy::KnownHosts(super::paths::expand_tilde(path))
            }
            _ => HostKeyPolicy::AcceptAny,
        };

        ConnectSettings {
            keepalive_interval: Duration::from_secs(self.ssh.keepalive_interval_secs),
            host_key_policy,
        }
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            max_preview_bytes: self.transfer.max_preview_bytes,
            compress_archives: self.transfer.compress_archives,
            archive_name: self.transfer.archive_name.trim().to_string(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse().map(Some).map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("{:?} is not a valid number", trimmed),
    })
}

fn default_true() -> bool {
    true
}

fn default_session_timeout() -> u64 {
    30 * 60
}

fn default_cleanup_interval() -> u64 {
    5 * 60
}

fn default_max_sessions() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Idle time after which a session expires.
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_session_timeout(),
            cleanup_interval_secs: default_cleanup_interval(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_keepalive() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyCheck {
    #[default]
    AcceptAny,
    KnownHosts,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SshConfig {
    #[serde(default = "default_timeout")]
    pub connection_timeout_secs: u64,
    #[serde(default = "default_keepalive")]
    pub keepalive_interval_secs: u64,
    #[serde(default)]
    pub host_key_policy: HostKeyCheck,
    /// OpenSSH-format file; `~/` is expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts_file: Option<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: default_timeout(),
            keepalive_interval_secs: default_keepalive(),
            host_key_policy: HostKeyCheck::default(),
            known_hosts_file: None,
        }
    }
}

fn default_max_preview_bytes() -> u64 {
    1024 * 1024
}

fn default_archive_name() -> String {
    "download.zip".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferConfig {
    #[serde(default = "default_max_preview_bytes")]
    pub max_preview_bytes: u64,
    /// Suggested file name for archive downloads.
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
    #[serde(default = "default_true")]
    pub compress_archives: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_preview_bytes: default_max_preview_bytes(),
            archive_name: default_archive_name(),
            compress_archives: true,
        }
    }
}
