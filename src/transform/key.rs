//! Cache key derivation.
//!
//! A cache key names the artifact produced by applying a set of transform
//! parameters to a source picture. Keys are human-inspectable object names:
//!
//! ```text
//! photos/cat.png  + {}                       -> photos/cat.png
//! photos/cat.png  + {w: 100}                 -> photos/cat_100xauto_q85_gray0.jpeg
//! photos/cat.png  + {h: 50, fm: webp, q: 60} -> photos/cat_autox50_q60_gray0.webp
//! ```
//!
//! The identity parameter set maps to the source identifier itself, so an
//! unmodified original is addressed at its natural path.

use crate::error::ParamError;

use super::params::TransformParams;

/// Derive the cache key for a source picture and normalized parameters.
///
/// Returns the source identifier unchanged for identity parameters.
pub fn derive_key(source_id: &str, params: &TransformParams) -> Result<String, ParamError> {
    validate_source_id(source_id)?;

    if params.is_identity() {
        return Ok(source_id.to_string());
    }

    // The extension names the output format, so `a.png` and `a.png?fm=png`
    // never share a key while producing different bytes

    let resolved = params.resolve();
    let dimension = |v: Option<u32>| v.map_or_else(|| "auto".to_string(), |v| v.to_string());

    Ok(format!(
        "{}_{}x{}_q{}_gray{}.{}",
        strip_extension(source_id),
        dimension(resolved.width),
        dimension(resolved.height),
        resolved.quality,
        u8::from(resolved.grayscale),
        resolved.format.extension(),
    ))
}

/// Check that a source identifier is a well-formed relative object path.
pub fn validate_source_id(source_id: &str) -> Result<(), ParamError> {
    let invalid = |reason: &'static str| -> Result<(), ParamError> {
        Err(ParamError::InvalidSourceId {
            source_id: source_id.to_string(),
            reason,
        })
    };

    if source_id.trim().is_empty() {
        return invalid("must not be empty");
    }
    if source_id.starts_with('/') || source_id.ends_with('/') {
        return invalid("must not start or end with '/'");
    }
    if source_id.chars().any(char::is_control) {
        return invalid("must not contain control characters");
    }
    for segment in source_id.split('/') {
        match segment {
            "" => return invalid("must not contain empty path segments"),
            "." | ".." => return invalid("must not contain relative path segments"),
            _ => {}
        }
    }

    Ok(())
}

/// Strip the final extension from the last path segment, if any.
///
/// `a/b.c/photo.tar.gz` becomes `a/b.c/photo.tar`; a leading dot (as in
/// `.hidden`) is not treated as an extension separator.
fn strip_extension(source_id: &str) -> &str {
    let name_start = source_id.rfind('/').map_or(0, |i| i + 1);
    match source_id[name_start..].rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < source_id.len() - name_start => {
            &source_id[..name_start + dot]
        }
        _ => source_id,
    }
}
