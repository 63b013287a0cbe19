//! Single-path operations against a session's connection.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::error::{ArchiveError, TransferError};
use crate::remote::RemoteReader;
use crate::session::{OwnedConnectionGuard, Session};

use super::archive::{ArchiveBuilder, ArchiveSummary};
use super::language::language_for;
use super::path;
use super::types::{EntryFilter, FileEntry, SortOrder};

/// Knobs for the transfer engine.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Default preview cap for callers that do not pass their own.
    pub max_preview_bytes: u64,
    /// Deflate file entries in archives; stored otherwise.
    pub compress_archives: bool,
    /// File name offered to clients for archive downloads.
    pub archive_name: String,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            max_preview_bytes: 1024 * 1024,
            compress_archives: true,
            archive_name: "download.zip".to_string(),
        }
    }
}

/// Text preview of a small remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub content: String,
    pub language: &'static str,
    pub size: u64,
}

/// Outcome of a multi-path delete. Failures never abort the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchDeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Read stream for one remote file.
///
/// Holds the session's connection lock until dropped, so no other
/// operation on the same session interleaves with the transfer. Every read
/// that yields data counts as activity on the session.
pub struct RemoteFile {
    reader: RemoteReader,
    session: Arc<Session>,
    // Declared after `reader` so the remote handle is released first.
    _guard: OwnedConnectionGuard,
}

impl AsyncRead for RemoteFile {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.reader).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            if buf.filled().len() > before {
                self.session.touch();
            }
        }
        poll
    }
}

impl std::fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFile").finish_non_exhaustive()
    }
}

/// Remote file operations. Every call takes a session obtained from
/// [`crate::session::SessionRegistry::get`] and goes through that session's
/// serialized connection.
#[derive(Debug, Clone, Default)]
pub struct TransferEngine {
    settings: TransferSettings,
}

impl TransferEngine {
    pub fn new(settings: TransferSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// List a directory, directories first, then by name ignoring case.
    /// An empty path lists the session's home directory.
    pub async fn list(
        &self,
        session: &Session,
        dir: &str,
        include_hidden: bool,
        filter: &EntryFilter,
    ) -> Result<Vec<FileEntry>, TransferError> {
        let dir = path::resolve(session.home_dir(), dir);
        let children = {
            let conn = session
                .connection()
                .await
                .ok_or(TransferError::SessionClosed)?;
            conn.read_dir(&dir)
                .await
                .map_err(|e| TransferError::remote(&dir, e))?
        };

        let mut entries: Vec<FileEntry> = children
            .into_iter()
            .filter(|child| child.name != "." && child.name != "..")
            .map(|child| {
                let full_path = path::join(&dir, &child.name);
                FileEntry::from_metadata(child.name, full_path, &child.metadata)
            })
            .filter(|entry| include_hidden || !entry.is_hidden())
            .filter(|entry| filter.matches(entry))
            .collect();

        SortOrder::NameAsc.sort(&mut entries);
        Ok(entries)
    }

    /// Open a file for streaming download.
    pub async fn open(
        &self,
        session: &Arc<Session>,
        file_path: &str,
    ) -> Result<(RemoteFile, FileEntry), TransferError> {
        let file_path = path::resolve(session.home_dir(), file_path);
        let conn = session
            .connection_owned()
            .await
            .ok_or(TransferError::SessionClosed)?;

        let metadata = conn
            .stat(&file_path)
            .await
            .map_err(|e| TransferError::remote(&file_path, e))?;
        if metadata.is_dir {
            return Err(TransferError::NotAFile { path: file_path });
        }

        let reader = conn
            .open_read(&file_path)
            .await
            .map_err(|e| TransferError::remote(&file_path, e))?;

        let entry = FileEntry::from_metadata(
            path::base_name(&file_path).to_string(),
            file_path.clone(),
            &metadata,
        );
        Ok((
            RemoteFile {
                reader,
                session: Arc::clone(session),
                _guard: conn,
            },
            entry,
        ))
    }

    /// Write `source` to `dest`. Without `overwrite`, an existing target is
    /// left untouched and reported as `AlreadyExists`.
    ///
    /// The existence check and the create are separate remote calls, so two
    /// uploaders racing for the same new path may both pass the check.
    pub async fn upload<R>(
        &self,
        session: &Session,
        dest: &str,
        source: &mut R,
        overwrite: bool,
    ) -> Result<u64, TransferError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let dest = path::resolve(session.home_dir(), dest);
        let conn = session
            .connection()
            .await
            .ok_or(TransferError::SessionClosed)?;

        if !overwrite {
            match conn.stat(&dest).await {
                Ok(_) => return Err(TransferError::AlreadyExists { path: dest }),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(TransferError::remote(&dest, e)),
            }
        }

        let mut writer = conn
            .create(&dest)
            .await
            .map_err(|e| TransferError::remote(&dest, e))?;
        let bytes = tokio::io::copy(source, &mut writer)
            .await
            .map_err(|e| TransferError::remote(&dest, e.into()))?;
        writer
            .shutdown()
            .await
            .map_err(|e| TransferError::remote(&dest, e.into()))?;

        tracing::debug!(path = %dest, bytes, "Upload complete");
        Ok(bytes)
    }

    /// Delete a file, or an empty directory. Non-empty directories fail;
    /// there is no recursive delete.
    pub async fn delete(&self, session: &Session, target: &str) -> Result<(), TransferError> {
        let target = path::resolve(session.home_dir(), target);
        let conn = session
            .connection()
            .await
            .ok_or(TransferError::SessionClosed)?;

        let metadata = conn
            .stat(&target)
            .await
            .map_err(|e| TransferError::remote(&target, e))?;

        let result = if metadata.is_dir {
            conn.remove_dir(&target).await
        } else {
            conn.remove_file(&target).await
        };
        result.map_err(|e| TransferError::remote(&target, e))
    }

    /// Delete each path independently, collecting per-path outcomes.
    pub async fn delete_many(&self, session: &Session, targets: &[String]) -> BatchDeleteReport {
        let mut report = BatchDeleteReport::default();

        for target in targets {
            match self.delete(session, target).await {
                Ok(()) => report.deleted.push(target.clone()),
                Err(e) => {
                    tracing::warn!(path = %target, "Batch delete skipped entry: {}", e);
                    report.failed.push((target.clone(), e.to_string()));
                }
            }
        }

        report
    }

    pub async fn make_dir(&self, session: &Session, dir: &str) -> Result<(), TransferError> {
        let dir = path::resolve(session.home_dir(), dir);
        let conn = session
            .connection()
            .await
            .ok_or(TransferError::SessionClosed)?;
        conn.make_dir(&dir)
            .await
            .map_err(|e| TransferError::remote(&dir, e))
    }

    /// Read a small file for display. Files larger than `max_bytes` are
    /// rejected before any content is read, and at most `max_bytes` bytes
    /// are ever buffered.
    pub async fn preview(
        &self,
        session: &Session,
        file_path: &str,
        max_bytes: u64,
    ) -> Result<Preview, TransferError> {
        let file_path = path::resolve(session.home_dir(), file_path);
        let conn = session
            .connection()
            .await
            .ok_or(TransferError::SessionClosed)?;

        let metadata = conn
            .stat(&file_path)
            .await
            .map_err(|e| TransferError::remote(&file_path, e))?;
        if metadata.is_dir {
            return Err(TransferError::NotAFile { path: file_path });
        }
        if metadata.size > max_bytes {
            return Err(TransferError::TooLarge {
                path: file_path,
                size: metadata.size,
                max: max_bytes,
            });
        }

        let reader = conn
            .open_read(&file_path)
            .await
            .map_err(|e| TransferError::remote(&file_path, e))?;

        let capacity = usize::try_from(metadata.size.min(max_bytes)).unwrap_or(0);
        let mut content = Vec::with_capacity(capacity);
        reader
            .take(max_bytes)
            .read_to_end(&mut content)
            .await
            .map_err(|e| TransferError::remote(&file_path, e.into()))?;

        Ok(Preview {
            size: content.len() as u64,
            content: String::from_utf8_lossy(&content).into_owned(),
            language: language_for(&file_path),
        })
    }

    /// Stream a ZIP of `paths` into `sink`. Per-path failures are logged
    /// and reported in the summary; only sink and writer failures are fatal.
    pub async fn archive<W>(
        &self,
        session: &Session,
        paths: &[String],
        sink: W,
    ) -> Result<ArchiveSummary, ArchiveError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        ArchiveBuilder::new(self.settings.compress_archives)
            .build(session, paths, sink)
            .await
    }
}
