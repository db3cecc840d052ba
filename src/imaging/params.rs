//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how* to produce it. They are
//! the interface between the compression logic (which decides quality and
//! target size) and the [`backend`](super::backend) (which does the pixel and
//! codec work). This separation allows swapping backends (e.g. a mock that
//! reports scripted sizes) without changing the search logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`OutputFormat`]: Target container/codec: JPEG, WebP or AVIF.
//! - [`OptimizationRequest`]: One desired output: target box, format, quality, progressive flag.
//! - [`OptimizationOptions`]: The loosely-typed external shape of a request, all fields optional.

use super::backend::BackendError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    /// Strict constructor for caller-supplied values: out of range is a
    /// rejected configuration, not something to clamp silently.
    pub fn try_new(value: u32) -> Result<Self, BackendError> {
        if (1..=100).contains(&value) {
            Ok(Self(value))
        } else {
            Err(BackendError::Encode(format!(
                "quality must be 1-100, got {value}"
            )))
        }
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Lower the quality by `step`, never going below `floor`.
    pub fn step_down(self, step: u32, floor: Quality) -> Self {
        Self(self.0.saturating_sub(step).max(floor.0))
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoded output format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    #[value(name = "webp")]
    WebP,
    Avif,
}

impl OutputFormat {
    /// File extension used for outputs of this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }

    /// The decoder-side format this output corresponds to.
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
            OutputFormat::WebP => image::ImageFormat::WebP,
            OutputFormat::Avif => image::ImageFormat::Avif,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
        };
        f.write_str(name)
    }
}

/// One desired output of the codec.
///
/// `width`/`height` describe a fit-inside box; either may be absent. The
/// backend never upscales, so a box larger than the source is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationRequest {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: OutputFormat,
    pub quality: Quality,
    pub progressive: bool,
}

impl OptimizationRequest {
    /// Request for `format` at default quality, no resize, progressive on.
    pub fn new(format: OutputFormat) -> Self {
        Self {
            width: None,
            height: None,
            format,
            quality: Quality::default(),
            progressive: true,
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_progressive(mut self, progressive: bool) -> Self {
        self.progressive = progressive;
        self
    }
}

impl Default for OptimizationRequest {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}

/// Caller-facing options, as they arrive from a form, a JSON body or CLI flags.
///
/// Resolve into an [`OptimizationRequest`] with [`OptimizationOptions::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizationOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u32>,
    pub format: Option<OutputFormat>,
    pub progressive: Option<bool>,
}

impl OptimizationOptions {
    /// Apply defaults (quality 85, JPEG, progressive) and validate ranges.
    pub fn resolve(&self) -> Result<OptimizationRequest, BackendError> {
        if self.width == Some(0) {
            return Err(BackendError::Encode("width must be positive".into()));
        }
        if self.height == Some(0) {
            return Err(BackendError::Encode("height must be positive".into()));
        }
        let quality = match self.quality {
            Some(q) => Quality::try_new(q)?,
            None => Quality::default(),
        };
        Ok(OptimizationRequest {
            width: self.width,
            height: self.height,
            format: self.format.unwrap_or_default(),
            quality,
            progressive: self.progressive.unwrap_or(true),
        })
    }
}
