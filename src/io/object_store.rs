use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Content type used when the store did not record one.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// An object read back from the durable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Raw object bytes
    pub data: Bytes,

    /// MIME type recorded with the object
    pub content_type: String,
}

impl StoredObject {
    /// Create a stored object from its bytes and content type.
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }
}

/// Trait for the durable blob store backing both the originals and the
/// transformed pictures.
///
/// Keys are logical: an implementation may namespace them (e.g. under a
/// bucket prefix) but must do so consistently across all three operations.
/// Implementations must be thread-safe, since a single store is shared by
/// every in-flight request and by the detached write-back tasks.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether an object exists.
    ///
    /// A missing object is a normal outcome and returns `Ok(false)`; only
    /// backend failures are errors.
    async fn exists(&self, key: &str) -> Result<bool, IoError>;

    /// Fetch an object.
    ///
    /// Returns `IoError::NotFound` when the key is absent.
    async fn get(&self, key: &str) -> Result<StoredObject, IoError>;

    /// Store an object, replacing any previous object under the same key.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), IoError>;

    /// Human-readable location of this store (for logging).
    ///
    /// For S3, this would typically be `s3://bucket/prefix`.
    fn identifier(&self) -> &str;
}
