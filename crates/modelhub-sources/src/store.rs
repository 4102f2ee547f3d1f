use std::fmt;

use futures::future::BoxFuture;
use thiserror::Error;

/// An error that happens when reading an object from a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The object does not exist in the backend.
    #[error("object not found")]
    NotFound,
    /// The backend refused the request due to missing permissions.
    ///
    /// The attached string contains the backend's response.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The object could not be fetched for any other reason, like connection
    /// loss or a 5xx server response.
    ///
    /// The attached string contains the backend's response.
    #[error("fetch failed: {0}")]
    Fetch(String),
}

/// A read-only object storage backend.
///
/// This is the full storage contract the metadata cache depends on: anything
/// that can answer a content-hash probe and a download is a valid backend,
/// whether that is S3, a local directory, or an in-memory test double.
pub trait ObjectStore: fmt::Debug + Send + Sync {
    /// Returns the content hash of the object at `bucket`/`key` without
    /// downloading it.
    ///
    /// The hash is opaque; the only guarantee is that it changes whenever
    /// the object's contents change.
    fn head<'a>(&'a self, bucket: &'a str, key: &'a str)
        -> BoxFuture<'a, Result<String, StoreError>>;

    /// Downloads the object at `bucket`/`key`.
    fn get<'a>(&'a self, bucket: &'a str, key: &'a str)
        -> BoxFuture<'a, Result<Vec<u8>, StoreError>>;
}
