//! Picture transform layer.
//!
//! This module turns a source picture plus query parameters into a cached,
//! transformed picture.
//!
//! # Architecture
//!
//! The transform service sits between the HTTP layer and the object store:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │ TransformQuery → TransformParams
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            TransformService             │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ MemoryCache  │  │ RasterTrans-    │  │
//! │  │ (encoded     │  │ former (decode →│  │
//! │  │  pictures)   │  │ resize → encode)│  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ derive_key()
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        ObjectStore (S3 / MinIO)         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TransformService`]: Main entry point, resolves requests through the cache tiers
//! - [`MemoryCache`]: Write-once in-process cache of encoded pictures
//! - [`RasterTransformer`]: Decodes, resizes, converts to grayscale and encodes
//! - [`TransformParams`]: Normalized parameters parsed from a [`TransformQuery`]
//! - [`derive_key`]: Deterministic cache key for a source and parameter set
//!
//! # Example
//!
//! ```
//! use picture_proxy::transform::{derive_key, OutputFormat, TransformParams};
//!
//! let params = TransformParams::identity()
//!     .with_width(320)
//!     .with_format(OutputFormat::Webp);
//!
//! let key = derive_key("photos/cat.png", &params).unwrap();
//! assert_eq!(key, "photos/cat_320xauto_q85_gray0.webp");
//! ```

mod cache;
mod encoder;
mod key;
mod params;
mod service;

pub use cache::{CachedImage, MemoryCache};
pub use encoder::{fit_within, ImageTransformer, RasterTransformer};
pub use key::{derive_key, validate_source_id};
pub use params::{
    clamp_quality, OutputFormat, ResolvedParams, TransformParams, TransformQuery,
    DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY,
};
pub use service::{
    CacheStatus, PictureRequest, PictureResponse, TransformService, DEFAULT_STORE_TIMEOUT,
    DEFAULT_TRANSFORM_TIMEOUT,
};
