//! 存储后端抽象与本地磁盘实现。
//!
//! Backends receive paths that already passed [`PathResolver`](crate::resolver::PathResolver).
//! No per-path locking is done: concurrent writes to the same object race and
//! the last completed rename wins, and a concurrent delete/upload pair may
//! interleave in any order.

use async_trait::async_trait;
use axum::body::Bytes;
use clap::ValueEnum;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, ErrorKind};
use tracing::debug;

use crate::atomic::AtomicFile;
use crate::resolver::ResolvedPath;

const STAGE_ATTEMPTS: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Real files under the storage root.
    Local,
    /// Accepts and echoes, never persists.
    Simulated,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Simulated => "simulated",
        }
    }
}

#[derive(Debug)]
pub enum StorageError {
    InvalidPath,
    NotFound,
    Io(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::InvalidPath => f.write_str("invalid path"),
            StorageError::NotFound => f.write_str("object not found"),
            StorageError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound,
            _ => StorageError::Io(err),
        }
    }
}

/// Write/delete/exists/prune capability set shared by all backends.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    fn kind(&self) -> BackendKind;

    /// Whether written bytes can be read back later.
    fn persists(&self) -> bool;

    /// Creates missing parent directories, then replaces any existing object.
    async fn write(&self, object: &ResolvedPath, content: Bytes) -> Result<(), StorageError>;

    async fn delete(&self, object: &ResolvedPath) -> Result<(), StorageError>;

    async fn exists(&self, object: &ResolvedPath) -> Result<bool, StorageError>;

    /// Removes `dir` only when empty and not the storage root. `Ok(false)` means nothing was removed.
    async fn remove_if_empty_dir(&self, dir: &Path) -> Result<bool, StorageError>;
}

#[derive(Clone, Debug)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// 逐级检查根目录以下已存在的分量，拒绝符号链接与非目录的中间分量。
    async fn ensure_no_symlink_components(
        &self,
        target: &Path,
        allow_missing_leaf: bool,
    ) -> Result<(), StorageError> {
        let relative = target
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::InvalidPath)?;
        let mut current = PathBuf::from(&self.root);
        let mut components = relative.components().peekable();

        while let Some(component) = components.next() {
            current.push(component.as_os_str());
            match fs::symlink_metadata(&current).await {
                Ok(metadata) => {
                    if metadata.file_type().is_symlink() {
                        return Err(StorageError::InvalidPath);
                    }
                    if components.peek().is_some() && !metadata.is_dir() {
                        return Err(StorageError::InvalidPath);
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound && allow_missing_leaf => {
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalDiskStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn persists(&self) -> bool {
        true
    }

    async fn write(&self, object: &ResolvedPath, content: Bytes) -> Result<(), StorageError> {
        let target = object.absolute();
        self.ensure_no_symlink_components(target, true).await?;

        let mut attempt = 1;
        let mut atomic = loop {
            match stage_beside(target).await {
                Ok(atomic) => break atomic,
                // A concurrent delete pruned the parent between creating it and staging.
                Err(err) if err.kind() == ErrorKind::NotFound && attempt < STAGE_ATTEMPTS => {
                    debug!(path = object.logical(), attempt, "parent directory vanished, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(StorageError::Io(err)),
            }
        };
        atomic
            .file_mut()
            .map_err(StorageError::Io)?
            .write_all(&content)
            .await
            .map_err(StorageError::Io)?;
        atomic.finalize().await.map_err(StorageError::Io)?;
        debug!(path = object.logical(), bytes = content.len(), "object written");
        Ok(())
    }

    async fn delete(&self, object: &ResolvedPath) -> Result<(), StorageError> {
        let target = object.absolute();
        self.ensure_no_symlink_components(target, false).await?;
        fs::remove_file(target).await?;
        Ok(())
    }

    async fn exists(&self, object: &ResolvedPath) -> Result<bool, StorageError> {
        let target = object.absolute();
        self.ensure_no_symlink_components(target, true).await?;
        match fs::metadata(target).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    async fn remove_if_empty_dir(&self, dir: &Path) -> Result<bool, StorageError> {
        if dir == self.root || !dir.starts_with(&self.root) {
            return Ok(false);
        }
        match fs::remove_dir(dir).await {
            Ok(()) => Ok(true),
            // Already pruned by a concurrent delete.
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

/// Creates missing parents (idempotent) and opens a staging file beside `target`.
async fn stage_beside(target: &Path) -> io::Result<AtomicFile> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    AtomicFile::new(target).await
}
