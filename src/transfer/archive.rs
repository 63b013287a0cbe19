//! Streaming ZIP assembly from remote paths.
//!
//! Entries are written with data descriptors, so nothing is buffered beyond
//! one copy chunk and the sink never needs to seek. A path that cannot be
//! read is logged and left out; the archive still completes. Only failures
//! writing to the sink abort the build.

use async_zip::base::write::ZipFileWriter;
use async_zip::tokio::write::ZipFileWriter as TokioZipWriter;
use async_zip::{Compression, ZipEntryBuilder};
use futures::AsyncWriteExt as _;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ArchiveError;
use crate::remote::RemoteFs;
use crate::session::Session;

use super::path;

const COPY_CHUNK_SIZE: usize = 32 * 1024;

/// A requested path, or a descendant of one, left out of the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub files: usize,
    pub directories: usize,
    /// Uncompressed bytes copied into file entries.
    pub bytes: u64,
    pub skipped: Vec<SkippedEntry>,
}

impl ArchiveSummary {
    fn skip(&mut self, path: &str, reason: impl std::fmt::Display) {
        let reason = reason.to_string();
        tracing::warn!(path = %path, "Skipping archive entry: {}", reason);
        self.skipped.push(SkippedEntry {
            path: path.to_string(),
            reason,
        });
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArchiveBuilder {
    compression: Compression,
}

impl ArchiveBuilder {
    pub fn new(compress: bool) -> Self {
        Self {
            compression: if compress {
                Compression::Deflate
            } else {
                Compression::Stored
            },
        }
    }

    /// Write one archive containing every path in `paths` to `sink`.
    ///
    /// Top-level files are named by their base name; directories are
    /// walked depth-first with entries named relative to the directory's
    /// own base name. Symlinks are archived by content and never descended.
    /// The connection is held for the whole build.
    pub async fn build<W>(
        &self,
        session: &Session,
        paths: &[String],
        sink: W,
    ) -> Result<ArchiveSummary, ArchiveError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let conn = session
            .connection()
            .await
            .ok_or(ArchiveError::SessionClosed)?;

        let mut walk = ArchiveWalk {
            fs: &*conn,
            session,
            zip: ZipFileWriter::with_tokio(sink),
            compression: self.compression,
            buf: vec![0u8; COPY_CHUNK_SIZE],
            summary: ArchiveSummary::default(),
        };

        for raw in paths {
            let remote = path::resolve(session.home_dir(), raw);
            let metadata = match walk.fs.stat(&remote).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    walk.summary.skip(&remote, e);
                    continue;
                }
            };

            let name = match path::base_name(&remote) {
                "/" | "" => "root".to_string(),
                name => name.to_string(),
            };
            if metadata.is_dir {
                walk.add_tree(&remote, &name).await?;
            } else {
                walk.add_file(&remote, name).await?;
            }
        }

        let ArchiveWalk { zip, summary, .. } = walk;
        let mut sink = zip.close().await?.into_inner();
        sink.flush().await.map_err(ArchiveError::Sink)?;

        tracing::debug!(
            files = summary.files,
            directories = summary.directories,
            skipped = summary.skipped.len(),
            bytes = summary.bytes,
            "Archive complete"
        );
        Ok(summary)
    }
}

struct ArchiveWalk<'a, W: AsyncWrite + Unpin> {
    fs: &'a dyn RemoteFs,
    session: &'a Session,
    zip: TokioZipWriter<W>,
    compression: Compression,
    buf: Vec<u8>,
    summary: ArchiveSummary,
}

impl<W: AsyncWrite + Unpin + Send> ArchiveWalk<'_, W> {
    async fn add_tree(&mut self, root: &str, root_name: &str) -> Result<(), ArchiveError> {
        let mut pending = vec![(root.to_string(), root_name.to_string())];

        while let Some((dir, prefix)) = pending.pop() {
            let children = match self.fs.read_dir(&dir).await {
                Ok(children) => children,
                Err(e) => {
                    self.summary.skip(&dir, e);
                    continue;
                }
            };

            let marker = ZipEntryBuilder::new(format!("{}/", prefix).into(), Compression::Stored);
            self.zip.write_entry_whole(marker, &[]).await?;
            self.summary.directories += 1;

            let mut subdirs = Vec::new();
            for child in children {
                if child.name == "." || child.name == ".." {
                    continue;
                }
                let child_path = path::join(&dir, &child.name);
                let child_name = format!("{}/{}", prefix, child.name);
                if child.metadata.is_dir {
                    subdirs.push((child_path, child_name));
                } else {
                    self.add_file(&child_path, child_name).await?;
                }
            }
            // Reversed so subdirectories pop in listing order.
            pending.extend(subdirs.into_iter().rev());
        }

        Ok(())
    }

    /// Copy one remote file into a new entry. A read failure after the
    /// entry is started still closes it, leaving a truncated entry.
    async fn add_file(&mut self, remote: &str, entry_name: String) -> Result<(), ArchiveError> {
        let mut reader = match self.fs.open_read(remote).await {
            Ok(reader) => reader,
            Err(e) => {
                self.summary.skip(remote, e);
                return Ok(());
            }
        };

        let builder = ZipEntryBuilder::new(entry_name.into(), self.compression);
        let mut entry = self.zip.write_entry_stream(builder).await?;

        let mut copied = 0u64;
        let mut read_error = None;
        loop {
            let n = match reader.read(&mut self.buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            };
            entry
                .write_all(&self.buf[..n])
                .await
                .map_err(ArchiveError::Sink)?;
            copied += n as u64;
        }
        entry.close().await?;
        self.session.touch();

        match read_error {
            Some(e) => self
                .summary
                .skip(remote, format!("read failed after {} bytes: {}", copied, e)),
            None => {
                self.summary.files += 1;
                self.summary.bytes += copied;
            }
        }
        Ok(())
    }
}
