//! In-memory picture cache.
//!
//! The memory tier sits in front of the durable store and holds encoded
//! pictures keyed by their cache key. It is the fastest path through the
//! service: a hit never touches the network.
//!
//! # Write-Once Entries
//!
//! Cached bytes for a key never change once written. A second insert for a
//! key that is already present is ignored, so concurrent computations of the
//! same key cannot replace bytes a reader has already been served.
//!
//! The cache is unbounded and entries live for the lifetime of the process.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

// =============================================================================
// Cached Image
// =============================================================================

/// An encoded picture together with its content type.
///
/// Cloning is cheap: the bytes and content type are reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    /// Encoded picture bytes
    pub data: Bytes,

    /// MIME type of `data` (e.g. `image/jpeg`)
    pub content_type: Arc<str>,
}

impl CachedImage {
    /// Create a cached image from bytes and a content type.
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<Arc<str>>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    /// Size of the encoded picture in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the encoded picture is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// =============================================================================
// Memory Cache
// =============================================================================

/// Process-local cache of encoded pictures.
///
/// # Thread Safety
///
/// The cache is safe to share across tasks via `Arc`. Lookups take a shared
/// lock; inserts take an exclusive lock only for the map update.
///
/// # Example
///
/// ```
/// use picture_proxy::transform::{CachedImage, MemoryCache};
///
/// #[tokio::main]
/// async fn main() {
///     let cache = MemoryCache::new();
///
///     let image = CachedImage::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg");
///     cache.insert("cat_100xauto_q85_gray0.jpeg", image.clone()).await;
///
///     assert_eq!(cache.get("cat_100xauto_q85_gray0.jpeg").await, Some(image));
/// }
/// ```
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CachedImage>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a cached picture.
    pub async fn get(&self, key: &str) -> Option<CachedImage> {
        self.entries.read().await.get(key).cloned()
    }

    /// Insert a picture unless the key is already cached.
    ///
    /// Returns the entry that is cached after the call, which is the existing
    /// one if another writer got there first.
    pub async fn insert(&self, key: impl Into<String>, image: CachedImage) -> CachedImage {
        let mut entries = self.entries.write().await;
        entries.entry(key.into()).or_insert(image).clone()
    }

    /// Number of cached pictures.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Total size of cached picture bytes.
    pub async fn size(&self) -> usize {
        self.entries.read().await.values().map(CachedImage::len).sum()
    }

    /// Remove every cached picture.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}
