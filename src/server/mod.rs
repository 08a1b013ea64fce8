//! HTTP server layer for Picture Proxy.
//!
//! This module provides the HTTP API for serving original and transformed
//! pictures.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │          GET /pictures/{*source_id}?w=&h=&fm=&q=&gray=          │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (requests, error → HTTP) │  │ (router config, CORS, trace)│  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, picture_handler, AppState, ErrorResponse, HealthResponse,
    CACHE_STATUS_HEADER,
};
pub use routes::{create_router, RouterConfig};
