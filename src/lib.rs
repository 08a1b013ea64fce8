//! # Picture Proxy
//!
//! An on-demand picture transformation proxy backed by S3-compatible object
//! storage.
//!
//! Clients request a source picture with optional resize, format, quality
//! and grayscale parameters. Each distinct transformation is computed once,
//! then served from an in-process memory cache or from the durable store.
//!
//! ## Features
//!
//! - **Deterministic cache keys**: equivalent parameter sets share one artifact
//! - **Two cache tiers**: process memory in front of the object store
//! - **Contain-without-enlargement resizing** to JPEG, PNG or WebP
//! - **Single-flight**: concurrent misses for one key run a single transform
//! - **Best-effort write-back**: a failing store write never fails a request
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`io`] - Object store abstraction and its S3 implementation
//! - [`transform`] - Key derivation, transformer, caches and orchestration
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error types shared across layers
//!
//! ## Example
//!
//! ```rust,no_run
//! use picture_proxy::{create_router, create_s3_client, RouterConfig, S3ObjectStore, TransformService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
//!     let store = S3ObjectStore::new(client, "my-pictures".to_string());
//!
//!     let router = create_router(TransformService::new(store), RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod server;
pub mod transform;

// Re-export commonly used types
pub use config::Config;
pub use error::{IoError, ParamError, ProxyError};
pub use io::{create_s3_client, ObjectStore, S3ObjectStore, StoredObject};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use transform::{
    derive_key, CacheStatus, CachedImage, ImageTransformer, MemoryCache, OutputFormat,
    PictureRequest, PictureResponse, RasterTransformer, TransformParams, TransformQuery,
    TransformService,
};
