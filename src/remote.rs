//! Connection factory and connection handle abstractions
//!
//! The session layer never speaks a wire protocol itself. It receives an
//! open [`RemoteFs`] from a [`Connector`] and funnels every remote call
//! through it. [`crate::sftp::SftpConnector`] is the production factory.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{ConnectError, RemoteError};

/// Byte stream for reading a remote file.
pub type RemoteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Byte sink for writing a remote file. Must be shut down to commit.
pub type RemoteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Target address and login for one connection attempt.
#[derive(Clone)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Attributes from a single stat or listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMetadata {
    pub size: u64,
    pub mode: u32,
    pub modified: Option<DateTime<Utc>>,
    pub is_dir: bool,
    pub is_symlink: bool,
}

/// One child returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDirEntry {
    pub name: String,
    pub metadata: RemoteMetadata,
}

/// An open, authenticated remote filesystem.
///
/// Implementations are not assumed to tolerate concurrent calls; the session
/// layer serializes access to each handle.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    async fn stat(&self, path: &str) -> Result<RemoteMetadata, RemoteError>;

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteDirEntry>, RemoteError>;

    async fn open_read(&self, path: &str) -> Result<RemoteReader, RemoteError>;

    /// Create or truncate a file for writing.
    async fn create(&self, path: &str) -> Result<RemoteWriter, RemoteError>;

    async fn remove_file(&self, path: &str) -> Result<(), RemoteError>;

    /// Remove a directory. Fails if it is not empty.
    async fn remove_dir(&self, path: &str) -> Result<(), RemoteError>;

    async fn make_dir(&self, path: &str) -> Result<(), RemoteError>;

    async fn working_dir(&self) -> Result<String, RemoteError>;

    async fn close(&self) -> Result<(), RemoteError>;
}

/// Factory producing authenticated connection handles.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Box<dyn RemoteFs>, ConnectError>;
}
