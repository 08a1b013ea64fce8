//! HTTP request handlers for the Picture Proxy API.
//!
//! This module contains the Axum handlers for serving pictures and health checks.
//!
//! # Endpoints
//!
//! - `GET /pictures/{*source_id}?w=&h=&fm=&q=&gray=` - Serve a picture
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::DEFAULT_CACHE_MAX_AGE;
use crate::error::{IoError, ProxyError};
use crate::io::ObjectStore;
use crate::transform::{
    ImageTransformer, PictureRequest, RasterTransformer, TransformParams, TransformQuery,
    TransformService,
};

/// Response header reporting which tier served a picture.
pub const CACHE_STATUS_HEADER: &str = "x-picture-cache";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the transform service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: ObjectStore + 'static, T: ImageTransformer = RasterTransformer> {
    /// The transform service for processing picture requests
    pub service: Arc<TransformService<S, T>>,

    /// Cache control max-age in seconds (defaults to 1 hour)
    pub cache_max_age: u32,
}

impl<S: ObjectStore + 'static, T: ImageTransformer> AppState<S, T> {
    /// Create a new application state with the given service.
    pub fn new(service: TransformService<S, T>) -> Self {
        Self::with_cache_max_age(service, DEFAULT_CACHE_MAX_AGE)
    }

    /// Create a new application state with custom cache max-age.
    pub fn with_cache_max_age(service: TransformService<S, T>, cache_max_age: u32) -> Self {
        Self {
            service: Arc::new(service),
            cache_max_age,
        }
    }
}

impl<S: ObjectStore + 'static, T: ImageTransformer> Clone for AppState<S, T> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_parameters")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Conversion
// =============================================================================

/// Convert ProxyError to HTTP response.
///
/// This implementation logs errors appropriately based on their severity:
/// - 404s are logged at DEBUG level
/// - other 4xx errors are logged at WARN level (client errors)
/// - 5xx errors are logged at ERROR level (server errors)
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ProxyError::InvalidParameters(_) => (StatusCode::BAD_REQUEST, "invalid_parameters"),
            ProxyError::SourceNotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            ProxyError::DecodeError { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "decode_error"),
            ProxyError::EncodeError { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
            ProxyError::Store(IoError::Connection(_)) => {
                (StatusCode::BAD_GATEWAY, "storage_unavailable")
            }
            ProxyError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ProxyError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            ProxyError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle picture requests.
///
/// # Endpoint
///
/// `GET /pictures/{*source_id}`
///
/// # Query Parameters
///
/// - `w`, `h`: Bounding box in pixels; the picture is never enlarged
/// - `fm`: Output format, `jpeg`, `png` or `webp` (default: jpeg)
/// - `q`: Quality 1-100, clamped (default: 85)
/// - `gray`: `1` to convert to grayscale
///
/// Without any parameters the original is served unchanged.
///
/// # Response
///
/// - `200 OK`: Picture bytes
/// - `400 Bad Request`: Malformed source identifier or parameters
/// - `404 Not Found`: Source picture does not exist
/// - `422 Unprocessable Entity`: Source is not a decodable picture
/// - `5xx`: Storage failure or timeout
///
/// # Headers
///
/// - `Content-Type`: MIME type of the served bytes
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Picture-Cache: memory|store|miss`
pub async fn picture_handler<S: ObjectStore + 'static, T: ImageTransformer>(
    State(state): State<AppState<S, T>>,
    Path(source_id): Path<String>,
    Query(query): Query<TransformQuery>,
) -> Result<Response, ProxyError> {
    let params = TransformParams::parse(&query)?;
    let response = state
        .service
        .get_picture(PictureRequest::new(source_id, params))
        .await?;

    debug!(
        key = %response.key,
        cache = response.cache.as_str(),
        hit = response.cache.is_hit(),
        bytes = response.image.len(),
        "Serving picture"
    );

    let headers = [
        (header::CONTENT_TYPE, response.image.content_type.to_string()),
        (
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        ),
        (
            HeaderName::from_static(CACHE_STATUS_HEADER),
            response.cache.as_str().to_string(),
        ),
    ];

    Ok((StatusCode::OK, headers, response.image.data).into_response())
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
