//! Production codec backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::load_from_memory` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3`, box from [`fit_inside`] |
//! | Encode → JPEG, progressive | `mozjpeg` (optimized scans and Huffman tables, trellis) |
//! | Encode → JPEG, baseline | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → WebP | `webp` (libwebp lossy, method 6, sharp YUV) |
//! | Encode → AVIF | `rav1e` 4:2:0 still frame in an `avif-serialize` container |
//!
//! Every call decodes the input from scratch. The backend keeps no state
//! between calls, which is what lets the variant generator share one
//! instance across threads.

use super::avif::encode_avif;
use super::backend::{BackendError, Dimensions, ImageBackend, OptimizationResult};
use super::calculations::fit_inside;
use super::params::{OptimizationRequest, OutputFormat, Quality};
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

/// rav1e speed: 1 is slowest/best, 10 fastest.
const AVIF_SPEED: u8 = 4;

/// libwebp compression method: 0 fastest, 6 slowest/best.
const WEBP_METHOD: i32 = 6;

/// Codec backend built on the `image` crate plus dedicated lossy encoders.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct CodecBackend;

impl CodecBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CodecBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an in-memory image of any compiled-in format.
fn decode(input: &[u8]) -> Result<DynamicImage, BackendError> {
    image::load_from_memory(input).map_err(|e| BackendError::Decode(e.to_string()))
}

/// Resize to the fit-inside box of the request. Never upscales.
fn resize(img: DynamicImage, request: &OptimizationRequest) -> DynamicImage {
    let source = (img.width(), img.height());
    let (width, height) = fit_inside(source, (request.width, request.height));
    if (width, height) == source {
        img
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    }
}

/// Normalize to 8-bit RGB or RGBA, the layouts every encoder here accepts.
fn to_8bit(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

fn encode_jpeg(
    img: &DynamicImage,
    quality: Quality,
    progressive: bool,
) -> Result<Vec<u8>, BackendError> {
    if progressive {
        encode_mozjpeg(img, quality)
    } else {
        encode_baseline_jpeg(img, quality)
    }
}

/// Progressive JPEG via mozjpeg. Trellis quantization and overshoot
/// deringing come from mozjpeg's default compression profile.
fn encode_mozjpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    // mozjpeg reports libjpeg errors by unwinding
    std::panic::catch_unwind(|| -> std::io::Result<Vec<u8>> {
        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality.value() as f32);
        comp.set_progressive_mode();
        comp.set_optimize_scans(true);
        comp.set_optimize_coding(true);

        let mut started = comp.start_compress(Vec::new())?;
        started.write_scanlines(rgb.as_raw())?;
        started.finish()
    })
    .map_err(|_| BackendError::Encode("JPEG encoder aborted".into()))?
    .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))
}

fn encode_baseline_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

/// Lossy WebP at maximum effort with sharp RGB→YUV conversion.
fn encode_webp(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let img = to_8bit(img);
    let encoder = webp::Encoder::from_image(&img)
        .map_err(|e| BackendError::Encode(format!("WebP encoder rejected image: {e}")))?;

    let mut config = webp::WebPConfig::new()
        .map_err(|_| BackendError::Encode("WebP config init failed".into()))?;
    config.lossless = 0;
    config.quality = quality.value() as f32;
    config.method = WEBP_METHOD;
    config.use_sharp_yuv = 1;

    let memory = encoder
        .encode_advanced(&config)
        .map_err(|e| BackendError::Encode(format!("WebP encode failed: {e:?}")))?;
    Ok(memory.to_vec())
}

impl ImageBackend for CodecBackend {
    fn encode(
        &self,
        input: &[u8],
        request: &OptimizationRequest,
    ) -> Result<OptimizationResult, BackendError> {
        let img = resize(decode(input)?, request);
        let dimensions = Dimensions {
            width: img.width(),
            height: img.height(),
        };

        let bytes = match request.format {
            OutputFormat::Jpeg => encode_jpeg(&img, request.quality, request.progressive)?,
            OutputFormat::WebP => encode_webp(&img, request.quality)?,
            OutputFormat::Avif => encode_avif(&img, request.quality, AVIF_SPEED)?,
        };

        Ok(OptimizationResult::new(
            bytes,
            dimensions,
            request,
            input.len(),
        ))
    }
}
