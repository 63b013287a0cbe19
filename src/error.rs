use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationError;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create config directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Failures while establishing an authenticated connection.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Timeout connecting to {host}:{port}")]
    Timeout { host: String, port: u16 },

    #[error("Connection failed to {host}:{port}: {source}")]
    Tcp {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    #[error("SSH handshake failed: {0}")]
    Handshake(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Host key verification failed: {0}")]
    HostKey(String),

    #[error("SFTP subsystem unavailable: {0}")]
    Subsystem(String),
}

impl From<russh::Error> for ConnectError {
    fn from(err: russh::Error) -> Self {
        ConnectError::Handshake(err.to_string())
    }
}

/// Errors reported by a connection handle during a remote operation.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        match self {
            RemoteError::NotFound(_) => true,
            RemoteError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Session lookup and lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid login request: {0}")]
    InvalidLogin(#[from] ValidationError),

    #[error("Maximum number of sessions reached ({max})")]
    CapacityExceeded { max: usize },

    #[error("Session not found")]
    NotFound,

    #[error("Session has expired")]
    Expired,

    #[error(transparent)]
    Connection(#[from] ConnectError),
}

/// Errors from single-path transfer operations
#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Session was closed while the request was in flight")]
    SessionClosed,

    #[error("Not a file: {path}")]
    NotAFile { path: String },

    #[error("File too large for preview: {path} is {size} bytes (limit {max})")]
    TooLarge { path: String, size: u64, max: u64 },

    #[error("File already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Remote operation failed on {path}: {source}")]
    Remote { path: String, source: RemoteError },
}

impl TransferError {
    pub(crate) fn remote(path: &str, source: RemoteError) -> Self {
        TransferError::Remote {
            path: path.to_string(),
            source,
        }
    }
}

/// Fatal archive errors. Per-path failures never surface here.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Session was closed while the archive was being built")]
    SessionClosed,

    #[error("Archive sink failed: {0}")]
    Sink(std::io::Error),

    #[error("Archive writer failed: {0}")]
    Zip(#[from] async_zip::error::ZipError),
}
