use std::time::Duration;

use thiserror::Error;

/// I/O errors that can occur when talking to the durable object store
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Errors raised while validating a source identifier or transform parameters.
///
/// These are always detected before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    /// The source identifier is empty or not a well-formed object path
    #[error("Invalid source identifier {source_id:?}: {reason}")]
    InvalidSourceId {
        source_id: String,
        reason: &'static str,
    },

    /// A parameter value could not be parsed
    #[error("Invalid value for '{param}': {value:?} ({reason})")]
    InvalidValue {
        param: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The requested output format is not one of jpeg, png or webp
    #[error("Unsupported output format: {0:?} (expected jpeg, png or webp)")]
    UnknownFormat(String),
}

/// Errors that can occur while serving a picture.
///
/// The variants are split so the HTTP layer can tell a missing source apart
/// from bad input and from processing failures.
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    /// Malformed request parameters, rejected before any I/O
    #[error("Invalid parameters: {0}")]
    InvalidParameters(#[from] ParamError),

    /// The original image does not exist in the durable store
    #[error("Source not found: {source_id}")]
    SourceNotFound { source_id: String },

    /// Source bytes are not a recognizable image
    #[error("Decode error: {message}")]
    DecodeError { message: String },

    /// The transformed image could not be encoded
    #[error("Encode error: {message}")]
    EncodeError { message: String },

    /// The durable store failed or is unavailable
    #[error("Store error: {0}")]
    Store(#[from] IoError),

    /// A store call or the transform exceeded its time budget
    #[error("{operation} timed out after {}ms", timeout.as_millis())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The blocking transform task panicked or was cancelled
    #[error("Internal error: {message}")]
    Internal { message: String },
}
