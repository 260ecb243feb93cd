//! Object storage backends for publishing release artifacts and manifests.
//!
//! This crate provides the `StorageBackend` trait (whole-object fetch and
//! store), an S3-compatible HTTP backend that signs requests with AWS
//! Signature V4, an in-memory backend for tests, and `RemoteConfig` describing
//! the endpoint, bucket, and credentials.

pub mod config;
pub mod memory;
pub mod s3;
pub mod sigv4;

pub use config::RemoteConfig;
pub use memory::{BackendCall, MemoryBackend};
pub use s3::S3Backend;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("remote config error: {0}")]
    Config(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Trait for object storage backends.
///
/// Both operations act on whole objects: a `put_object` replaces any previous
/// object under the same key.
pub trait StorageBackend: Send + Sync {
    /// Download an object. Returns `RemoteError::NotFound` if the key is absent.
    fn get_object(&self, key: &str) -> Result<Vec<u8>, RemoteError>;

    /// Upload an object, replacing whatever was stored under `key`.
    fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), RemoteError>;

    /// Like `get_object`, but absence is `Ok(None)` rather than an error.
    fn fetch_optional(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError> {
        match self.get_object(key) {
            Ok(data) => Ok(Some(data)),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
