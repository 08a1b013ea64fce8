//! Configuration management for Picture Proxy.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `PROXY_` prefix (optionally from a `.env` file)
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use picture_proxy::config::Config;
//!
//! // Parse from command line and environment
//! let config = Config::parse();
//!
//! println!("Listening on {}", config.bind_address());
//! println!("S3 bucket: {}", config.s3_bucket);
//! ```
//!
//! # Environment Variables
//!
//! All configuration options can be set via environment variables with the `PROXY_` prefix:
//!
//! - `PROXY_HOST` - Server bind address (default: 0.0.0.0)
//! - `PROXY_PORT` - Server port (default: 3000)
//! - `PROXY_S3_BUCKET` - S3 bucket name (required)
//! - `PROXY_S3_PREFIX` - Key prefix for originals and derived pictures (default: pictures/)
//! - `PROXY_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `PROXY_S3_REGION` - AWS region (default: us-east-1)
//! - `PROXY_STORE_TIMEOUT_MS` - Time budget per store call (default: 10000)
//! - `PROXY_TRANSFORM_TIMEOUT_MS` - Time budget per transform (default: 30000)
//! - `PROXY_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `PROXY_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::time::Duration;

use clap::Parser;

use crate::io::DEFAULT_KEY_PREFIX;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default store call timeout in milliseconds.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 10_000;

/// Default transform timeout in milliseconds.
pub const DEFAULT_TRANSFORM_TIMEOUT_MS: u64 = 30_000;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Picture Proxy - on-demand picture resizing and format conversion.
///
/// Serves originals and transformed variants of pictures stored in S3 or
/// S3-compatible storage, caching results in memory and in the bucket.
#[derive(Parser, Debug, Clone)]
#[command(name = "picture-proxy")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PROXY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PROXY_PORT")]
    pub port: u16,

    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// S3 bucket name containing the pictures.
    #[arg(long, env = "PROXY_S3_BUCKET")]
    pub s3_bucket: String,

    /// Key prefix under which originals and derived pictures are stored.
    ///
    /// Use an empty string to store keys at the bucket root.
    #[arg(long, default_value = DEFAULT_KEY_PREFIX, env = "PROXY_S3_PREFIX")]
    pub s3_prefix: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    ///
    /// If not specified, uses the default AWS S3 endpoint.
    #[arg(long, env = "PROXY_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "PROXY_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Timeouts
    // =========================================================================
    /// Time budget for a single store call, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_STORE_TIMEOUT_MS, env = "PROXY_STORE_TIMEOUT_MS")]
    pub store_timeout_ms: u64,

    /// Time budget for decoding, transforming and encoding, in milliseconds.
    #[arg(
        long,
        default_value_t = DEFAULT_TRANSFORM_TIMEOUT_MS,
        env = "PROXY_TRANSFORM_TIMEOUT_MS"
    )]
    pub transform_timeout_ms: u64,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "PROXY_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "PROXY_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.s3_bucket.trim().is_empty() {
            return Err(
                "S3 bucket name is required. Set --s3-bucket or PROXY_S3_BUCKET".to_string(),
            );
        }

        if self.s3_prefix.starts_with('/') {
            return Err(format!(
                "s3_prefix must be relative to the bucket root, got {:?}",
                self.s3_prefix
            ));
        }

        if self.store_timeout_ms == 0 {
            return Err("store_timeout_ms must be greater than 0".to_string());
        }
        if self.transform_timeout_ms == 0 {
            return Err("transform_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Time budget for a single store call.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Time budget for a single transform.
    pub fn transform_timeout(&self) -> Duration {
        Duration::from_millis(self.transform_timeout_ms)
    }
}

// =============================================================================
// Tests
// =============================================================================
