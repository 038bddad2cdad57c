//! Shared helpers for handler and router tests.

use async_trait::async_trait;
use axum::body::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::resolver::ResolvedPath;
use crate::storage::{BackendKind, StorageBackend, StorageError};

/// Counts backend calls; every object exists and writes are dropped.
#[derive(Default)]
pub struct RecordingBackend {
    writes: AtomicUsize,
    deletes: AtomicUsize,
    lookups: AtomicUsize,
    prunes: AtomicUsize,
    fail_prune: bool,
    fail_delete: bool,
}

impl RecordingBackend {
    pub fn failing_prune() -> Self {
        Self {
            fail_prune: true,
            ..Self::default()
        }
    }

    pub fn failing_delete() -> Self {
        Self {
            fail_delete: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.writes() + self.deletes() + self.lookups.load(Ordering::SeqCst)
            + self.prunes.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    fn persists(&self) -> bool {
        false
    }

    async fn write(&self, _object: &ResolvedPath, _content: Bytes) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, _object: &ResolvedPath) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::ResourceBusy,
                "device or resource busy",
            )));
        }
        Ok(())
    }

    async fn exists(&self, _object: &ResolvedPath) -> Result<bool, StorageError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn remove_if_empty_dir(&self, _dir: &Path) -> Result<bool, StorageError> {
        self.prunes.fetch_add(1, Ordering::SeqCst);
        if self.fail_prune {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "permission denied",
            )));
        }
        Ok(false)
    }
}

/// Minimal byte sequence with a PDF header, padded to `len`.
pub fn pdf_bytes(len: usize) -> Vec<u8> {
    let mut content = b"%PDF-1.7\n".to_vec();
    content.resize(len.max(content.len()), b'0');
    content
}

/// Every entry below `root`, relative and sorted.
pub fn list_tree(root: &Path) -> Vec<PathBuf> {
    let mut entries = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).expect("read dir").flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path.clone());
            }
            entries.push(path.strip_prefix(root).expect("under root").to_path_buf());
        }
    }
    entries.sort();
    entries
}

/// Builds a `multipart/form-data` body; returns the content type and bytes.
pub fn multipart_body(file: Option<(&str, &[u8])>, file_path: Option<&str>) -> (String, Vec<u8>) {
    let boundary = "docgate-test-boundary";
    let mut body = Vec::new();
    if let Some(path) = file_path {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"filePath\"\r\n\r\n{path}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"document.pdf\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
