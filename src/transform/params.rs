//! Transform parameters and their normalization.
//!
//! Parameters arrive as loosely-typed query values (`w`, `h`, `fm`, `q`,
//! `gray`) and are parsed into [`TransformParams`]. Values that are the
//! documented default are normalized away so that an explicit default and an
//! omitted field compare equal, which keeps cache keys canonical.

use std::fmt;
use std::num::{IntErrorKind, NonZeroU32};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ParamError;

/// Default output quality (1-100).
pub const DEFAULT_QUALITY: u8 = 85;

/// Minimum allowed quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum allowed quality.
pub const MAX_QUALITY: u8 = 100;

// =============================================================================
// Output Format
// =============================================================================

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    /// MIME type of pictures encoded in this format.
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
        }
    }

    /// File extension used in derived cache keys.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::Webp),
            _ => Err(ParamError::UnknownFormat(s.to_string())),
        }
    }
}

// =============================================================================
// Raw Query
// =============================================================================

/// Raw, unparsed transform parameters as they appear in a query string.
///
/// Everything is kept as a string so that malformed values surface as
/// [`ParamError`]s instead of extractor rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransformQuery {
    /// Target width in pixels
    #[serde(default)]
    pub w: Option<String>,

    /// Target height in pixels
    #[serde(default)]
    pub h: Option<String>,

    /// Output format (`jpeg`, `png`, `webp`)
    #[serde(default)]
    pub fm: Option<String>,

    /// Output quality (clamped to 1-100)
    #[serde(default)]
    pub q: Option<String>,

    /// Grayscale flag (`0`/`1`)
    #[serde(default)]
    pub gray: Option<String>,
}

// =============================================================================
// Transform Params
// =============================================================================

/// Normalized transform parameters.
///
/// `quality` is `None` whenever it equals [`DEFAULT_QUALITY`]; build values
/// through [`TransformParams::with_quality`] or [`TransformParams::parse`] to
/// keep that invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransformParams {
    /// Bounding box width (`None` = unbounded)
    pub width: Option<NonZeroU32>,

    /// Bounding box height (`None` = unbounded)
    pub height: Option<NonZeroU32>,

    /// Explicit output format (`None` = JPEG once any transform is requested)
    pub format: Option<OutputFormat>,

    /// Explicit, clamped, non-default quality
    pub quality: Option<u8>,

    /// Convert to grayscale after resizing
    pub grayscale: bool,
}

impl TransformParams {
    /// The identity parameter set: serve the original untouched.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Parse raw query values into normalized parameters.
    ///
    /// Empty values are treated as absent.
    pub fn parse(query: &TransformQuery) -> Result<Self, ParamError> {
        let width = non_empty(&query.w)
            .map(|v| parse_dimension("w", v))
            .transpose()?;
        let height = non_empty(&query.h)
            .map(|v| parse_dimension("h", v))
            .transpose()?;
        let format = non_empty(&query.fm)
            .map(str::parse::<OutputFormat>)
            .transpose()?;
        let quality = non_empty(&query.q).map(parse_quality).transpose()?;
        let grayscale = non_empty(&query.gray)
            .map(parse_flag)
            .transpose()?
            .unwrap_or(false);

        let mut params = Self {
            width,
            height,
            format,
            quality: None,
            grayscale,
        };
        if let Some(q) = quality {
            params = params.with_quality(q);
        }
        Ok(params)
    }

    /// Set the bounding box width.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = NonZeroU32::new(width);
        self
    }

    /// Set the bounding box height.
    pub fn with_height(mut self, height: u32) -> Self {
        self.height = NonZeroU32::new(height);
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the quality, clamping into 1-100 and normalizing the default away.
    pub fn with_quality(mut self, quality: u8) -> Self {
        let quality = clamp_quality(quality);
        self.quality = (quality != DEFAULT_QUALITY).then_some(quality);
        self
    }

    /// Enable or disable grayscale conversion.
    pub fn with_grayscale(mut self, grayscale: bool) -> Self {
        self.grayscale = grayscale;
        self
    }

    /// Whether these parameters request no transformation at all.
    pub fn is_identity(&self) -> bool {
        self.width.is_none()
            && self.height.is_none()
            && self.format.is_none()
            && self.quality.is_none()
            && !self.grayscale
    }

    /// Apply defaults, producing the parameters handed to the transformer.
    pub fn resolve(&self) -> ResolvedParams {
        ResolvedParams {
            width: self.width.map(NonZeroU32::get),
            height: self.height.map(NonZeroU32::get),
            format: self.format.unwrap_or_default(),
            quality: self.quality.unwrap_or(DEFAULT_QUALITY),
            grayscale: self.grayscale,
        }
    }
}

/// Fully-defaulted transform parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: OutputFormat,
    pub quality: u8,
    pub grayscale: bool,
}

// =============================================================================
// Parsing Helpers
// =============================================================================

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_dimension(param: &'static str, value: &str) -> Result<NonZeroU32, ParamError> {
    let parsed: u32 = value.parse().map_err(|_| ParamError::InvalidValue {
        param,
        value: value.to_string(),
        reason: "expected a positive integer",
    })?;
    NonZeroU32::new(parsed).ok_or_else(|| ParamError::InvalidValue {
        param,
        value: value.to_string(),
        reason: "must be greater than zero",
    })
}

fn parse_quality(value: &str) -> Result<u8, ParamError> {
    let parsed: i64 = match value.parse() {
        Ok(parsed) => parsed,
        // Integers too large for i64 still clamp
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => MAX_QUALITY as i64,
        Err(e) if *e.kind() == IntErrorKind::NegOverflow => MIN_QUALITY as i64,
        Err(_) => {
            return Err(ParamError::InvalidValue {
                param: "q",
                value: value.to_string(),
                reason: "expected an integer",
            })
        }
    };
    Ok(parsed.clamp(MIN_QUALITY as i64, MAX_QUALITY as i64) as u8)
}

fn parse_flag(value: &str) -> Result<bool, ParamError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(ParamError::InvalidValue {
            param: "gray",
            value: value.to_string(),
            reason: "expected 0 or 1",
        }),
    }
}

/// Clamp quality to valid range.
///
/// Values below 1 become 1, values above 100 become 100.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_QUALITY, MAX_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
