//! Picture service orchestrating the cache tiers and the transformer.
//!
//! The TransformService is the main entry point for picture requests. It
//! resolves a request through progressively more expensive tiers:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        TransformService                          │
//! │                                                                  │
//! │  get_picture(source_id, params)                                  │
//! │    1. Derive key ──────────► invalid? ──► InvalidParameters      │
//! │    2. Memory cache ────────► hit? ──────► CacheStatus::Memory    │
//! │    3. Join or lead the in-flight computation for the key         │
//! │    4. Store exists(key) ───► yes ─► get(key) ─► Store            │
//! │    5. Store get(source) ───► missing? ──► SourceNotFound         │
//! │    6. Transform (blocking pool, bounded by a timeout)            │
//! │    7. Memory insert, detached durable write-back ─► Miss         │
//! │                                                                  │
//! │    ┌─────────────┐     ┌──────────────┐     ┌─────────────────┐  │
//! │    │ MemoryCache │     │ ObjectStore  │     │ImageTransformer │  │
//! │    └─────────────┘     └──────────────┘     └─────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Concurrency
//!
//! Concurrent misses for the same key are coalesced: one caller computes the
//! picture and every other caller waits for and shares its result. If the
//! computing caller is cancelled, a waiting caller takes over. Results,
//! including errors, are only shared with callers that joined while the
//! computation was running; later requests start fresh.
//!
//! The durable write-back is detached from the request. Its failure is logged
//! and never affects the response.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{IoError, ProxyError};
use crate::io::ObjectStore;

use super::cache::{CachedImage, MemoryCache};
use super::encoder::{ImageTransformer, RasterTransformer};
use super::key::derive_key;
use super::params::TransformParams;

/// Default time budget for a single store call: 10 seconds
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time budget for decoding, transforming and encoding: 30 seconds
pub const DEFAULT_TRANSFORM_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Request / Response
// =============================================================================

/// A request for a (possibly transformed) picture.
#[derive(Debug, Clone)]
pub struct PictureRequest {
    /// Source identifier relative to the store prefix (e.g. `photos/cat.png`)
    pub source_id: String,

    /// Normalized transform parameters
    pub params: TransformParams,
}

impl PictureRequest {
    /// Create a new picture request.
    pub fn new(source_id: impl Into<String>, params: TransformParams) -> Self {
        Self {
            source_id: source_id.into(),
            params,
        }
    }

    /// Create a request for the unmodified original.
    pub fn original(source_id: impl Into<String>) -> Self {
        Self::new(source_id, TransformParams::identity())
    }
}

/// Which tier answered a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the in-process memory cache
    Memory,

    /// Served from a previously stored object in the durable store
    Store,

    /// Computed from the source picture
    Miss,
}

impl CacheStatus {
    /// Lowercase name used in response headers and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Memory => "memory",
            CacheStatus::Store => "store",
            CacheStatus::Miss => "miss",
        }
    }

    /// Whether the picture came from either cache tier.
    pub fn is_hit(self) -> bool {
        !matches!(self, CacheStatus::Miss)
    }
}

/// Response from the picture service.
#[derive(Debug, Clone)]
pub struct PictureResponse {
    /// The encoded picture and its content type
    pub image: CachedImage,

    /// Which tier answered the request
    pub cache: CacheStatus,

    /// The cache key the picture is stored under
    pub key: String,
}

// =============================================================================
// Transform Service
// =============================================================================

type Flight = Arc<OnceCell<Result<(CachedImage, CacheStatus), ProxyError>>>;

/// A running computation and the number of callers attached to it.
struct InFlight {
    cell: Flight,
    callers: usize,
}

type InFlightTable = Mutex<HashMap<String, InFlight>>;

/// A caller's membership in the in-flight computation for one key.
///
/// The table entry is removed once the computation has finished or the last
/// attached caller is gone, even when callers are cancelled mid-flight.
struct FlightGuard<'a> {
    table: &'a InFlightTable,
    key: &'a str,
    cell: Flight,
}

impl<'a> FlightGuard<'a> {
    fn join(table: &'a InFlightTable, key: &'a str) -> Self {
        let mut in_flight = table.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = in_flight.entry(key.to_string()).or_insert_with(|| InFlight {
            cell: Arc::new(OnceCell::new()),
            callers: 0,
        });
        entry.callers += 1;

        Self {
            table,
            key,
            cell: Arc::clone(&entry.cell),
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let finished = match in_flight.get_mut(self.key) {
            Some(entry) if Arc::ptr_eq(&entry.cell, &self.cell) => {
                entry.callers -= 1;
                entry.callers == 0 || self.cell.initialized()
            }
            _ => false,
        };
        if finished {
            in_flight.remove(self.key);
        }
    }
}

/// Service for resolving, transforming and caching pictures.
///
/// # Type Parameters
///
/// * `S` - The durable object store (e.g. `S3ObjectStore`)
/// * `T` - The picture transformer, `RasterTransformer` by default
///
/// # Example
///
/// ```ignore
/// use picture_proxy::io::S3ObjectStore;
/// use picture_proxy::transform::{PictureRequest, TransformParams, TransformService};
///
/// let service = TransformService::new(S3ObjectStore::new(client, "my-bucket".into()));
///
/// let params = TransformParams::identity().with_width(200);
/// let response = service.get_picture(PictureRequest::new("cat.png", params)).await?;
///
/// println!("{} bytes via {}", response.image.len(), response.cache.as_str());
/// ```
pub struct TransformService<S: ObjectStore + 'static, T: ImageTransformer = RasterTransformer> {
    /// Durable object store holding originals and derived pictures
    store: Arc<S>,

    /// Picture transformer, shared with blocking tasks
    transformer: Arc<T>,

    /// In-process memory tier
    cache: MemoryCache,

    /// Computations currently running, keyed by cache key
    in_flight: InFlightTable,

    store_timeout: Duration,
    transform_timeout: Duration,
}

impl<S: ObjectStore + 'static> TransformService<S> {
    /// Create a service with the default raster transformer.
    pub fn new(store: S) -> Self {
        Self::with_transformer(store, RasterTransformer::new())
    }
}

impl<S: ObjectStore + 'static, T: ImageTransformer> TransformService<S, T> {
    /// Create a service with a custom transformer.
    pub fn with_transformer(store: S, transformer: T) -> Self {
        Self::with_shared_store(Arc::new(store), transformer)
    }

    /// Create a service around a store shared with other components.
    pub fn with_shared_store(store: Arc<S>, transformer: T) -> Self {
        Self {
            store,
            transformer: Arc::new(transformer),
            cache: MemoryCache::new(),
            in_flight: Mutex::new(HashMap::new()),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            transform_timeout: DEFAULT_TRANSFORM_TIMEOUT,
        }
    }

    /// Set the time budgets for store calls and for the transform.
    pub fn with_timeouts(mut self, store_timeout: Duration, transform_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self.transform_timeout = transform_timeout;
        self
    }

    /// Get a picture, computing and caching it if necessary.
    ///
    /// # Errors
    ///
    /// - `InvalidParameters` if the source identifier is malformed
    /// - `SourceNotFound` if the original does not exist in the store
    /// - `DecodeError` if the original is not a decodable picture
    /// - `Store` or `Timeout` if the durable store fails or is slow
    ///
    /// Nothing is cached when an error is returned.
    pub async fn get_picture(&self, request: PictureRequest) -> Result<PictureResponse, ProxyError> {
        let key = derive_key(&request.source_id, &request.params)?;

        if let Some(image) = self.cache.get(&key).await {
            debug!(key = %key, "Memory cache hit");
            return Ok(PictureResponse {
                image,
                cache: CacheStatus::Memory,
                key,
            });
        }

        let result = {
            let flight = FlightGuard::join(&self.in_flight, &key);
            flight
                .cell
                .get_or_init(|| self.resolve_miss(&key, &request))
                .await
                .clone()
        };

        let (image, cache) = result?;
        Ok(PictureResponse { image, cache, key })
    }

    /// Resolve a memory-cache miss through the durable store and transformer.
    async fn resolve_miss(
        &self,
        key: &str,
        request: &PictureRequest,
    ) -> Result<(CachedImage, CacheStatus), ProxyError> {
        // Another caller may have finished between our memory check and here
        if let Some(image) = self.cache.get(key).await {
            return Ok((image, CacheStatus::Memory));
        }

        let stored = match self.store_call("store exists", self.store.exists(key)).await {
            Ok(stored) => stored,
            Err(ProxyError::Store(IoError::NotFound(_))) => false,
            Err(e) => return Err(e),
        };

        if stored {
            let object = self.store_call("store get", self.store.get(key)).await?;
            debug!(key = %key, "Durable store hit");
            let image = self
                .cache
                .insert(key, CachedImage::new(object.data, object.content_type))
                .await;
            return Ok((image, CacheStatus::Store));
        }

        // The identity key is the source itself, so there is nothing to derive from
        if request.params.is_identity() {
            return Err(ProxyError::SourceNotFound {
                source_id: request.source_id.clone(),
            });
        }

        let source = self
            .store_call("source get", self.store.get(&request.source_id))
            .await
            .map_err(|e| match e {
                ProxyError::Store(IoError::NotFound(_)) => ProxyError::SourceNotFound {
                    source_id: request.source_id.clone(),
                },
                other => other,
            })?;

        debug!(
            key = %key,
            source_id = %request.source_id,
            source_bytes = source.data.len(),
            "Transforming picture"
        );

        let transformer = Arc::clone(&self.transformer);
        let resolved = request.params.resolve();
        let task =
            tokio::task::spawn_blocking(move || transformer.transform(&source.data, &resolved));

        let image = match tokio::time::timeout(self.transform_timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => {
                return Err(ProxyError::Internal {
                    message: format!("transform task failed: {}", join_error),
                })
            }
            Err(_) => {
                return Err(ProxyError::Timeout {
                    operation: "transform",
                    timeout: self.transform_timeout,
                })
            }
        };

        let image = self.cache.insert(key, image).await;
        self.spawn_write_back(key.to_string(), image.clone());

        Ok((image, CacheStatus::Miss))
    }

    /// Persist a computed picture to the durable store without blocking the caller.
    fn spawn_write_back(&self, key: String, image: CachedImage) {
        let store = Arc::clone(&self.store);
        let timeout = self.store_timeout;

        tokio::spawn(async move {
            let put = store.put(&key, image.data, &image.content_type);
            match tokio::time::timeout(timeout, put).await {
                Ok(Ok(())) => debug!(key = %key, "Stored transformed picture"),
                Ok(Err(e)) => warn!(
                    key = %key,
                    error = %e,
                    "Failed to store transformed picture"
                ),
                Err(_) => warn!(
                    key = %key,
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out storing transformed picture"
                ),
            }
        });
    }

    /// Run a store call under the store time budget.
    async fn store_call<R>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<R, IoError>>,
    ) -> Result<R, ProxyError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(ProxyError::from),
            Err(_) => Err(ProxyError::Timeout {
                operation,
                timeout: self.store_timeout,
            }),
        }
    }

    /// Get memory cache statistics.
    ///
    /// Returns `(total_bytes, entry_count)`.
    pub async fn cache_stats(&self) -> (usize, usize) {
        (self.cache.size().await, self.cache.len().await)
    }

    /// Clear the memory cache. The durable store is untouched.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
