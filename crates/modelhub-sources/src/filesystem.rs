//! Support for reading hub content from a local directory tree.

use std::io;
use std::path::PathBuf;

use futures::future::BoxFuture;
use sha2::{Digest, Sha256};

use crate::{ObjectStore, StoreError};

/// An [`ObjectStore`] backed by the local file system.
///
/// Objects live at `<root>/<bucket>/<key>`. Content hashes are SHA-256
/// digests of the file contents, so a rewritten file always probes as
/// changed. Useful for development against a mirrored bucket and for tests
/// that want real I/O without a network.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Creates a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

fn map_io_error(err: io::Error) -> StoreError {
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound,
        io::ErrorKind::PermissionDenied => StoreError::PermissionDenied(err.to_string()),
        _ => StoreError::Fetch(err.to_string()),
    }
}

impl ObjectStore for FilesystemStore {
    fn head<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        Box::pin(async move {
            let path = self.object_path(bucket, key);
            tracing::debug!(path = %path.display(), "hashing local object");
            let contents = tokio::fs::read(&path).await.map_err(map_io_error)?;
            Ok(format!("{:x}", Sha256::digest(&contents)))
        })
    }

    fn get<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, StoreError>> {
        Box::pin(async move {
            let path = self.object_path(bucket, key);
            tracing::debug!(path = %path.display(), "reading local object");
            tokio::fs::read(&path).await.map_err(map_io_error)
        })
    }
}
