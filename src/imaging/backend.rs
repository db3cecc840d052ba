//! Codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the single transcode operation every
//! backend must support: decode the input bytes, resize to fit the requested
//! box, and encode to the requested format. It is stateless and has no retry
//! logic; the quality search lives in [`compress`](crate::compress).
//!
//! The production implementation is
//! [`CodecBackend`](super::codec_backend::CodecBackend).

use super::calculations::compression_ratio;
use super::params::{OptimizationRequest, OutputFormat, Quality};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    /// The input bytes are not a decodable raster image.
    #[error("decode failed: {0}")]
    Decode(String),
    /// The encoder rejected the configuration or failed while encoding.
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Output of one encode call. Ownership of the bytes passes to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub bytes: Vec<u8>,
    pub dimensions: Dimensions,
    pub format: OutputFormat,
    pub quality: Quality,
    pub original_size: usize,
}

impl OptimizationResult {
    pub fn new(
        bytes: Vec<u8>,
        dimensions: Dimensions,
        request: &OptimizationRequest,
        original_size: usize,
    ) -> Self {
        Self {
            bytes,
            dimensions,
            format: request.format,
            quality: request.quality,
            original_size,
        }
    }

    pub fn optimized_size(&self) -> usize {
        self.bytes.len()
    }

    /// Percentage saved relative to the original, see [`compression_ratio`].
    pub fn compression_ratio(&self) -> i64 {
        compression_ratio(self.original_size, self.optimized_size())
    }
}

/// Trait for codec backends.
///
/// `Sync` so that one backend can serve the parallel jobs of a variant
/// bundle. Implementations must be pure with respect to their inputs.
pub trait ImageBackend: Sync {
    /// Decode `input`, resize per the request's fit-inside box, encode.
    fn encode(
        &self,
        input: &[u8],
        request: &OptimizationRequest,
    ) -> Result<OptimizationResult, BackendError>;
}
