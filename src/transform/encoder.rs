//! Picture transformer.
//!
//! This module decodes source pictures, applies the requested resize and
//! grayscale operations, and encodes the result in the requested format.
//!
//! # Design Decisions
//!
//! - **Contain without enlargement**: the picture is scaled to fit inside the
//!   requested box while preserving its aspect ratio, and is never upscaled.
//!   A missing box side is unbounded.
//!
//! - **Output format is explicit**: the output is always re-encoded in the
//!   resolved format (JPEG unless asked otherwise). The content type follows
//!   the output format, never the source.
//!
//! - **Uniform quality**: JPEG and WebP use quality directly. PNG is lossless,
//!   so quality selects the compression effort instead.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader};

use crate::error::ProxyError;

use super::cache::CachedImage;
use super::params::{clamp_quality, OutputFormat, ResolvedParams};

// =============================================================================
// Transformer Trait
// =============================================================================

/// Turns source picture bytes into an encoded, transformed picture.
///
/// Implementations are CPU-bound and synchronous; the service runs them on
/// the blocking thread pool.
pub trait ImageTransformer: Send + Sync + 'static {
    /// Decode `source`, apply `params` and encode the result.
    fn transform(&self, source: &[u8], params: &ResolvedParams)
        -> Result<CachedImage, ProxyError>;
}

// =============================================================================
// Raster Transformer
// =============================================================================

/// Transformer backed by the `image` crate (and `webp` for lossy WebP).
///
/// # Example
///
/// ```ignore
/// use picture_proxy::transform::{ImageTransformer, RasterTransformer, TransformParams};
///
/// let transformer = RasterTransformer::new();
/// let params = TransformParams::identity().with_width(100).resolve();
/// let output = transformer.transform(&source_bytes, &params)?;
/// assert_eq!(&*output.content_type, "image/jpeg");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RasterTransformer {}

impl RasterTransformer {
    /// Create a new transformer.
    pub fn new() -> Self {
        Self {}
    }

    fn decode(&self, source: &[u8]) -> Result<DynamicImage, ProxyError> {
        ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(decode_error)?
            .decode()
            .map_err(decode_error)
    }
}

impl ImageTransformer for RasterTransformer {
    fn transform(
        &self,
        source: &[u8],
        params: &ResolvedParams,
    ) -> Result<CachedImage, ProxyError> {
        let mut img = self.decode(source)?;

        if params.width.is_some() || params.height.is_some() {
            let (width, height) =
                fit_within(img.width(), img.height(), params.width, params.height);
            if (width, height) != (img.width(), img.height()) {
                img = img.resize_exact(width, height, FilterType::Lanczos3);
            }
        }

        if params.grayscale {
            img = img.grayscale();
        }

        let quality = clamp_quality(params.quality);
        let data = match params.format {
            OutputFormat::Jpeg => encode_jpeg(&img, quality)?,
            OutputFormat::Png => encode_png(&img, quality)?,
            OutputFormat::Webp => encode_webp(&img, quality)?,
        };

        Ok(CachedImage::new(data, params.format.content_type()))
    }
}

// =============================================================================
// Geometry
// =============================================================================

/// Compute the output size for a contain-without-enlargement resize.
///
/// Returns the source size unchanged when it already fits the box.
pub fn fit_within(
    src_width: u32,
    src_height: u32,
    max_width: Option<u32>,
    max_height: Option<u32>,
) -> (u32, u32) {
    if src_width == 0 || src_height == 0 {
        return (src_width, src_height);
    }

    let scale = |max: Option<u32>, src: u32| max.map_or(f64::INFINITY, |m| m as f64 / src as f64);
    let scale_w = scale(max_width, src_width);
    let scale_h = scale(max_height, src_height);

    match (max_width, max_height) {
        (Some(w), _) if scale_w <= scale_h && scale_w < 1.0 => {
            let h = (src_height as f64 * scale_w).round() as u32;
            (w, h.max(1))
        }
        (_, Some(h)) if scale_h < scale_w && scale_h < 1.0 => {
            let w = (src_width as f64 * scale_h).round() as u32;
            (w.max(1), h)
        }
        _ => (src_width, src_height),
    }
}

// =============================================================================
// Encoders
// =============================================================================

/// Flatten to raw pixel bytes in the narrowest layout the image needs.
fn raw_pixels(img: &DynamicImage, keep_alpha: bool) -> (Vec<u8>, ExtendedColorType) {
    let color = img.color();
    match (color.has_color(), keep_alpha && color.has_alpha()) {
        (false, false) => (img.to_luma8().into_raw(), ExtendedColorType::L8),
        (false, true) => (img.to_luma_alpha8().into_raw(), ExtendedColorType::La8),
        (true, false) => (img.to_rgb8().into_raw(), ExtendedColorType::Rgb8),
        (true, true) => (img.to_rgba8().into_raw(), ExtendedColorType::Rgba8),
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProxyError> {
    let (pixels, color) = raw_pixels(img, false);
    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality)
        .write_image(&pixels, img.width(), img.height(), color)
        .map_err(encode_error)?;
    Ok(output)
}

fn encode_png(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProxyError> {
    let compression = match quality {
        0..=49 => CompressionType::Fast,
        50..=89 => CompressionType::Default,
        _ => CompressionType::Best,
    };

    let (pixels, color) = raw_pixels(img, true);
    let mut output = Vec::new();
    PngEncoder::new_with_quality(&mut output, compression, PngFilter::Adaptive)
        .write_image(&pixels, img.width(), img.height(), color)
        .map_err(encode_error)?;
    Ok(output)
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProxyError> {
    // libwebp only takes RGB(A) input
    let (width, height) = (img.width(), img.height());
    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height)
            .encode_simple(false, quality as f32)
            .map_err(|e| encode_error(format!("{:?}", e)))?
            .to_vec()
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height)
            .encode_simple(false, quality as f32)
            .map_err(|e| encode_error(format!("{:?}", e)))?
            .to_vec()
    };
    Ok(encoded)
}

fn decode_error(e: impl ToString) -> ProxyError {
    ProxyError::DecodeError {
        message: e.to_string(),
    }
}

fn encode_error(e: impl ToString) -> ProxyError {
    ProxyError::EncodeError {
        message: e.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
