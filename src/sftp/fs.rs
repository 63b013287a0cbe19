use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use russh::Disconnect;
use russh::client;
use russh_sftp::client::SftpSession as RusshSftpSession;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::protocol::{FileAttributes, StatusCode};
use tokio::sync::Mutex;

use crate::error::RemoteError;
use crate::remote::{RemoteDirEntry, RemoteFs, RemoteMetadata, RemoteReader, RemoteWriter};

use super::handler::ClientHandler;

/// An authenticated SFTP channel plus the SSH connection carrying it.
pub struct SftpFs {
    sftp: Mutex<RusshSftpSession>,
    handle: Mutex<client::Handle<ClientHandler>>,
}

impl std::fmt::Debug for SftpFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpFs").finish_non_exhaustive()
    }
}

impl SftpFs {
    pub(super) fn new(sftp: RusshSftpSession, handle: client::Handle<ClientHandler>) -> Self {
        Self {
            sftp: Mutex::new(sftp),
            handle: Mutex::new(handle),
        }
    }
}

fn map_error(path: &str, err: SftpError) -> RemoteError {
    match err {
        SftpError::Status(status) => match status.status_code {
            StatusCode::NoSuchFile => RemoteError::NotFound(path.to_string()),
            StatusCode::PermissionDenied => RemoteError::PermissionDenied(path.to_string()),
            _ => RemoteError::Protocol(format!("{}: {}", path, status.error_message)),
        },
        other => RemoteError::Protocol(format!("{}: {}", path, other)),
    }
}

fn convert_metadata(attrs: &FileAttributes) -> RemoteMetadata {
    RemoteMetadata {
        size: attrs.size.unwrap_or(0),
        mode: attrs.permissions.unwrap_or(0),
        modified: attrs
            .mtime
            .and_then(|mtime| Utc.timestamp_opt(i64::from(mtime), 0).single()),
        is_dir: attrs.is_dir(),
        is_symlink: attrs.is_symlink(),
    }
}

#[async_trait]
impl RemoteFs for SftpFs {
    async fn stat(&self, path: &str) -> Result<RemoteMetadata, RemoteError> {
        let sftp = self.sftp.lock().await;
        let attrs = sftp
            .metadata(path.to_string())
            .await
            .map_err(|e| map_error(path, e))?;
        Ok(convert_metadata(&attrs))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteDirEntry>, RemoteError> {
        let sftp = self.sftp.lock().await;
        let read_dir = sftp
            .read_dir(path.to_string())
            .await
            .map_err(|e| map_error(path, e))?;

        Ok(read_dir
            .map(|entry| RemoteDirEntry {
                metadata: convert_metadata(&entry.metadata()),
                name: entry.file_name(),
            })
            .collect())
    }

    async fn open_read(&self, path: &str) -> Result<RemoteReader, RemoteError> {
        let sftp = self.sftp.lock().await;
        let file = sftp
            .open(path.to_string())
            .await
            .map_err(|e| map_error(path, e))?;
        Ok(Box::new(file))
    }

    async fn create(&self, path: &str) -> Result<RemoteWriter, RemoteError> {
        let sftp = self.sftp.lock().await;
        let file = sftp
            .create(path.to_string())
            .await
            .map_err(|e| map_error(path, e))?;
        Ok(Box::new(file))
    }

    async fn remove_file(&self, path: &str) -> Result<(), RemoteError> {
        let sftp = self.sftp.lock().await;
        sftp.remove_file(path.to_string())
            .await
            .map_err(|e| map_error(path, e))
    }

    async fn remove_dir(&self, path: &str) -> Result<(), RemoteError> {
        let sftp = self.sftp.lock().await;
        sftp.remove_dir(path.to_string())
            .await
            .map_err(|e| map_error(path, e))
    }

    async fn make_dir(&self, path: &str) -> Result<(), RemoteError> {
        let sftp = self.sftp.lock().await;
        sftp.create_dir(path.to_string())
            .await
            .map_err(|e| map_error(path, e))
    }

    async fn working_dir(&self) -> Result<String, RemoteError> {
        let sftp = self.sftp.lock().await;
        sftp.canonicalize(".")
            .await
            .map_err(|e| map_error(".", e))
    }

    async fn close(&self) -> Result<(), RemoteError> {
        let sftp = self.sftp.lock().await;
        if let Err(e) = sftp.close().await {
            tracing::debug!("SFTP channel close failed: {}", e);
        }
        self.handle
            .lock()
            .await
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| RemoteError::Protocol(format!("Disconnect failed: {}", e)))
    }
}
