//! Common test utilities: an in-memory remote filesystem and connector.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use sftp_relay::error::{ConnectError, RemoteError};
use sftp_relay::remote::{
    Connector, Credentials, RemoteDirEntry, RemoteFs, RemoteMetadata, RemoteReader, RemoteWriter,
};
use sftp_relay::session::SessionSettings;

pub const HOME: &str = "/home/alice";

#[derive(Default)]
struct Tree {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl Tree {
    fn children(&self, dir: &str) -> Vec<(String, bool)> {
        let mut out = Vec::new();
        for d in &self.dirs {
            if d != dir && parent_of(d) == dir {
                out.push((name_of(d).to_string(), true));
            }
        }
        for f in self.files.keys() {
            if parent_of(f) == dir {
                out.push((name_of(f).to_string(), false));
            }
        }
        out
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "/",
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[derive(Default)]
struct Inner {
    tree: Mutex<Tree>,
    working_dir: Mutex<Option<String>>,
    fail_stat: Mutex<HashSet<String>>,
    fail_open: Mutex<HashSet<String>>,
    fail_read: Mutex<HashSet<String>>,
    fail_list: Mutex<HashSet<String>>,
    op_delay: Mutex<Option<Duration>>,
    closes: AtomicUsize,
    opens: AtomicUsize,
    used_after_close: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// In-memory remote filesystem. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryFs {
    inner: Arc<Inner>,
}

impl MemoryFs {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.inner.tree.lock().dirs.insert("/".to_string());
        fs
    }

    /// Filesystem with `HOME` as its reported working directory.
    pub fn with_home() -> Self {
        let fs = Self::new();
        fs.add_dir(HOME);
        fs.set_working_dir(Some(HOME));
        fs
    }

    pub fn add_dir(&self, path: &str) {
        let mut tree = self.inner.tree.lock();
        let mut current = path.to_string();
        while current != "/" {
            tree.dirs.insert(current.clone());
            current = parent_of(&current).to_string();
        }
    }

    pub fn add_file(&self, path: &str, content: impl Into<Vec<u8>>) {
        self.add_dir(parent_of(path));
        self.inner
            .tree
            .lock()
            .files
            .insert(path.to_string(), content.into());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.tree.lock().files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.inner.tree.lock().dirs.contains(path)
    }

    pub fn set_working_dir(&self, dir: Option<&str>) {
        *self.inner.working_dir.lock() = dir.map(str::to_string);
    }

    pub fn fail_stat(&self, path: &str) {
        self.inner.fail_stat.lock().insert(path.to_string());
    }

    pub fn fail_open(&self, path: &str) {
        self.inner.fail_open.lock().insert(path.to_string());
    }

    /// Reads of `path` return half the content, then an error.
    pub fn fail_read(&self, path: &str) {
        self.inner.fail_read.lock().insert(path.to_string());
    }

    pub fn fail_list(&self, path: &str) {
        self.inner.fail_list.lock().insert(path.to_string());
    }

    /// Every operation sleeps this long while counted as in flight.
    pub fn set_op_delay(&self, delay: Duration) {
        *self.inner.op_delay.lock() = Some(delay);
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    pub fn used_after_close(&self) -> usize {
        self.inner.used_after_close.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<InFlight<'_>, RemoteError> {
        if self.closes() > 0 {
            self.inner.used_after_close.fetch_add(1, Ordering::SeqCst);
            return Err(RemoteError::Protocol("connection closed".to_string()));
        }
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.inner);

        let delay = *self.inner.op_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(guard)
    }

    fn metadata(&self, path: &str) -> Option<RemoteMetadata> {
        let tree = self.inner.tree.lock();
        if tree.dirs.contains(path) {
            return Some(RemoteMetadata {
                size: 4096,
                mode: 0o40755,
                modified: None,
                is_dir: true,
                is_symlink: false,
            });
        }
        tree.files.get(path).map(|content| RemoteMetadata {
            size: content.len() as u64,
            mode: 0o100644,
            modified: None,
            is_dir: false,
            is_symlink: false,
        })
    }
}

struct InFlight<'a>(&'a Inner);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteFs for MemoryFs {
    async fn stat(&self, path: &str) -> Result<RemoteMetadata, RemoteError> {
        let _op = self.enter().await?;
        if self.inner.fail_stat.lock().contains(path) {
            return Err(RemoteError::PermissionDenied(path.to_string()));
        }
        self.metadata(path)
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteDirEntry>, RemoteError> {
        let _op = self.enter().await?;
        if self.inner.fail_list.lock().contains(path) {
            return Err(RemoteError::PermissionDenied(path.to_string()));
        }
        if !self.has_dir(path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }

        let children = self.inner.tree.lock().children(path);
        Ok(children
            .into_iter()
            .filter_map(|(name, _)| {
                let full = if path == "/" {
                    format!("/{}", name)
                } else {
                    format!("{}/{}", path, name)
                };
                self.metadata(&full)
                    .map(|metadata| RemoteDirEntry { name, metadata })
            })
            .collect())
    }

    async fn open_read(&self, path: &str) -> Result<RemoteReader, RemoteError> {
        let _op = self.enter().await?;
        if self.inner.fail_open.lock().contains(path) {
            return Err(RemoteError::PermissionDenied(path.to_string()));
        }
        let content = self
            .file(path)
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
        self.inner.opens.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_read.lock().contains(path) {
            let fail_at = content.len() / 2;
            return Ok(Box::new(FailingReader {
                data: content,
                pos: 0,
                fail_at,
            }));
        }
        Ok(Box::new(io::Cursor::new(content)))
    }

    async fn create(&self, path: &str) -> Result<RemoteWriter, RemoteError> {
        let _op = self.enter().await?;
        if !self.has_dir(parent_of(path)) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        if self.has_dir(path) {
            return Err(RemoteError::Protocol(format!("{} is a directory", path)));
        }
        self.add_file(path, Vec::new());
        Ok(Box::new(MemoryWriter {
            fs: self.clone(),
            path: path.to_string(),
            buf: Vec::new(),
        }))
    }

    async fn remove_file(&self, path: &str) -> Result<(), RemoteError> {
        let _op = self.enter().await?;
        self.inner
            .tree
            .lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    async fn remove_dir(&self, path: &str) -> Result<(), RemoteError> {
        let _op = self.enter().await?;
        let mut tree = self.inner.tree.lock();
        if !tree.dirs.contains(path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        if !tree.children(path).is_empty() {
            return Err(RemoteError::Protocol(format!(
                "{} is not empty",
                path
            )));
        }
        tree.dirs.remove(path);
        Ok(())
    }

    async fn make_dir(&self, path: &str) -> Result<(), RemoteError> {
        let _op = self.enter().await?;
        if self.metadata(path).is_some() {
            return Err(RemoteError::Protocol(format!("{} already exists", path)));
        }
        if !self.has_dir(parent_of(path)) {
            return Err(RemoteError::NotFound(parent_of(path).to_string()));
        }
        self.inner.tree.lock().dirs.insert(path.to_string());
        Ok(())
    }

    async fn working_dir(&self) -> Result<String, RemoteError> {
        let _op = self.enter().await?;
        self.inner
            .working_dir
            .lock()
            .clone()
            .ok_or_else(|| RemoteError::Protocol("realpath unsupported".to_string()))
    }

    async fn close(&self) -> Result<(), RemoteError> {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingReader {
    data: Vec<u8>,
    pos: usize,
    fail_at: usize,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pos >= self.fail_at {
            return Poll::Ready(Err(io::Error::other("injected read failure")));
        }
        let end = self.fail_at.min(self.pos + buf.remaining());
        let chunk = self.data[self.pos..end].to_vec();
        buf.put_slice(&chunk);
        self.pos = end;
        Poll::Ready(Ok(()))
    }
}

/// Buffers writes and commits them to the tree on shutdown.
struct MemoryWriter {
    fs: MemoryFs,
    path: String,
    buf: Vec<u8>,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buf.extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let content = self.buf.clone();
        self.fs.add_file(&self.path, content);
        Poll::Ready(Ok(()))
    }
}

/// Connector handing out [`MemoryFs`] handles.
pub struct MemoryConnector {
    factory: Box<dyn Fn() -> MemoryFs + Send + Sync>,
    created: Mutex<Vec<MemoryFs>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    attempts: AtomicUsize,
}

impl MemoryConnector {
    /// A fresh filesystem for every connection.
    pub fn fresh() -> Arc<Self> {
        Self::with_factory(MemoryFs::with_home)
    }

    /// Every connection shares `fs`.
    pub fn sharing(fs: MemoryFs) -> Arc<Self> {
        Self::with_factory(move || fs.clone())
    }

    fn with_factory(factory: impl Fn() -> MemoryFs + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            factory: Box::new(factory),
            created: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<MemoryFs> {
        self.created.lock().clone()
    }

    pub fn total_closes(&self) -> usize {
        self.created.lock().iter().map(MemoryFs::closes).sum()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        _credentials: &Credentials,
        _timeout: Duration,
    ) -> Result<Box<dyn RemoteFs>, ConnectError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().clone();
        if let Some(reason) = failure {
            return Err(ConnectError::Authentication(reason));
        }

        let fs = (self.factory)();
        self.created.lock().push(fs.clone());
        Ok(Box::new(fs))
    }
}

pub fn credentials(username: &str) -> Credentials {
    Credentials {
        host: "files.example.com".to_string(),
        port: 22,
        username: username.to_string(),
        password: SecretString::from("hunter2"),
    }
}

pub fn settings(max_sessions: usize, timeout_secs: u64) -> SessionSettings {
    SessionSettings {
        timeout: Duration::from_secs(timeout_secs),
        cleanup_interval: Duration::from_secs(10),
        max_sessions,
        connect_timeout: Duration::from_secs(5),
    }
}

/// Sink accepting `limit` bytes, then failing every write.
pub struct FailingSink {
    pub written: usize,
    pub limit: usize,
}

impl FailingSink {
    pub fn new(limit: usize) -> Self {
        Self { written: 0, limit }
    }
}

impl AsyncWrite for FailingSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.written >= self.limit {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "client went away",
            )));
        }
        let n = data.len().min(self.limit - self.written);
        self.written += n;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
