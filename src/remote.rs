//! 模拟远程对象存储：只校验并回显，从不持久化。

use async_trait::async_trait;
use axum::body::Bytes;
use std::path::Path;
use tracing::warn;

use crate::resolver::ResolvedPath;
use crate::storage::{BackendKind, StorageBackend, StorageError};

/// Stand-in for an object-store client. Uploaded bytes are discarded.
///
/// Every object is reported as present and every delete succeeds, mirroring
/// an endpoint that echoes success without a bucket behind it. A real client
/// must replace this before anything relies on reading documents back.
#[derive(Clone, Debug)]
pub struct SimulatedRemoteStorage {
    bucket: String,
}

impl SimulatedRemoteStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl StorageBackend for SimulatedRemoteStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    fn persists(&self) -> bool {
        false
    }

    async fn write(&self, object: &ResolvedPath, content: Bytes) -> Result<(), StorageError> {
        warn!(
            bucket = self.bucket,
            key = object.logical(),
            bytes = content.len(),
            "simulated remote storage discarded upload"
        );
        Ok(())
    }

    async fn delete(&self, object: &ResolvedPath) -> Result<(), StorageError> {
        warn!(
            bucket = self.bucket,
            key = object.logical(),
            "simulated remote storage ignored delete"
        );
        Ok(())
    }

    async fn exists(&self, _object: &ResolvedPath) -> Result<bool, StorageError> {
        Ok(true)
    }

    async fn remove_if_empty_dir(&self, _dir: &Path) -> Result<bool, StorageError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::PathResolver;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_never_touches_disk() {
        let temp = tempdir().expect("tempdir");
        let resolver = PathResolver::new(temp.path());
        let storage = SimulatedRemoteStorage::new("documents");
        let object = resolver.resolve("clients/7/contract.pdf").expect("resolve");

        storage
            .write(&object, Bytes::from_static(b"%PDF-1.7"))
            .await
            .expect("write");

        assert!(!storage.persists());
        assert_eq!(storage.kind(), BackendKind::Simulated);
        assert_eq!(std::fs::read_dir(temp.path()).expect("list").count(), 0);
        assert!(storage.exists(&object).await.expect("exists"));
        storage.delete(&object).await.expect("delete");
    }
}
