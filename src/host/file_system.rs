//! Asynchronous file system provider.

use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use bytes::Bytes;
use tokio::runtime::Handle;

pub type ReadCallback = Box<dyn FnOnce(io::Result<Bytes>) + Send>;
pub type WriteCallback = Box<dyn FnOnce(io::Result<()>) + Send>;
pub type StatCallback = Box<dyn FnOnce(io::Result<StatResult>) + Send>;

/// File metadata delivered to `_fileSystem.stat` callbacks.
///
/// A missing file is not an error: it is reported with `exists == false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatResult {
    pub exists: bool,
    pub is_file: bool,
    pub is_directory: bool,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
}

/// File operations used by the `_fileSystem` script object.
///
/// Every callback is invoked exactly once, on any thread, possibly after the
/// engine that issued the operation has been dropped.
pub trait FileSystem: Send + Sync {
    fn read(&self, path: &str, callback: ReadCallback);

    fn write(&self, path: &str, data: Bytes, callback: WriteCallback);

    fn move_file(&self, from: &str, to: &str, callback: WriteCallback);

    fn remove(&self, path: &str, callback: WriteCallback);

    fn stat(&self, path: &str, callback: StatCallback);

    /// Map a script-supplied path to the path the provider operates on.
    fn resolve(&self, path: &str) -> String;
}

/// `tokio::fs` backed file system.
///
/// Relative paths resolve against `base_dir` when one is configured.
/// Completions are delivered on the runtime's blocking pool, since they take
/// the engine lock.
pub struct DefaultFileSystem {
    handle: Handle,
    base_dir: Option<PathBuf>,
}

impl DefaultFileSystem {
    pub fn new(handle: Handle, base_dir: Option<PathBuf>) -> Self {
        Self { handle, base_dir }
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);

        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn spawn<T, F>(&self, operation: F, callback: Box<dyn FnOnce(io::Result<T>) + Send>)
    where
        T: Send + 'static,
        F: Future<Output = io::Result<T>> + Send + 'static,
    {
        self.handle.spawn(async move {
            let result = operation.await;
            complete(callback, result);
        });
    }
}

impl FileSystem for DefaultFileSystem {
    fn read(&self, path: &str, callback: ReadCallback) {
        let path = self.resolve_path(path);
        self.spawn(async move { tokio::fs::read(path).await.map(Bytes::from) }, callback);
    }

    fn write(&self, path: &str, data: Bytes, callback: WriteCallback) {
        let path = self.resolve_path(path);
        self.spawn(async move { tokio::fs::write(path, data).await }, callback);
    }

    fn move_file(&self, from: &str, to: &str, callback: WriteCallback) {
        let from = self.resolve_path(from);
        let to = self.resolve_path(to);
        self.spawn(async move { tokio::fs::rename(from, to).await }, callback);
    }

    fn remove(&self, path: &str, callback: WriteCallback) {
        let path = self.resolve_path(path);
        self.spawn(async move { tokio::fs::remove_file(path).await }, callback);
    }

    fn stat(&self, path: &str, callback: StatCallback) {
        let path = self.resolve_path(path);

        self.spawn(
            async move {
                match tokio::fs::metadata(path).await {
                    Ok(metadata) => Ok(stat_from_metadata(&metadata)),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StatResult::default()),
                    Err(e) => Err(e),
                }
            },
            callback,
        );
    }

    fn resolve(&self, path: &str) -> String {
        self.resolve_path(path).to_string_lossy().into_owned()
    }
}

fn stat_from_metadata(metadata: &std::fs::Metadata) -> StatResult {
    let last_modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    StatResult {
        exists: true,
        is_file: metadata.is_file(),
        is_directory: metadata.is_dir(),
        last_modified,
    }
}

/// Deliver a completion off the async workers.
pub(crate) fn complete<T: Send + 'static>(callback: Box<dyn FnOnce(T) + Send>, value: T) {
    tokio::task::spawn_blocking(move || callback(value));
}
