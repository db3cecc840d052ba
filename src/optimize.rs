//! Single-shot optimization and the keep-smaller policy.
//!
//! [`optimize_image`] is the adaptive compressor exposed directly: one
//! source, one request, one result. Batch tooling wraps it with
//! [`choose_smaller`] to decide whether writing the optimized file is worth
//! it at all, or whether the original should be left untouched.

use crate::compress::{Compressed, CompressionPolicy, compress};
use crate::imaging::{
    BackendError, ImageBackend, OptimizationRequest, OptimizationResult, OutputFormat,
};
use image::ImageFormat;

/// Caller-owned input bytes plus the format sniffed from their header.
///
/// `format` is `None` when the header is not recognized; that alone is not
/// an error, decoding decides.
#[derive(Debug, Clone, Copy)]
pub struct SourceImage<'a> {
    pub bytes: &'a [u8],
    pub format: Option<ImageFormat>,
}

impl<'a> SourceImage<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            format: image::guess_format(bytes).ok(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Optimize one image to one target, with the size-vs-quality search.
pub fn optimize_image(
    backend: &impl ImageBackend,
    source: &SourceImage<'_>,
    request: &OptimizationRequest,
    policy: &CompressionPolicy,
) -> Result<Compressed, BackendError> {
    compress(backend, source.bytes, request, policy)
}

/// Outcome of the keep-smaller comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Selected {
    /// The source bytes are at least as small; keep them unchanged.
    Original,
    /// The freshly encoded output wins.
    Optimized(OptimizationResult),
}

impl Selected {
    pub fn is_original(&self) -> bool {
        matches!(self, Selected::Original)
    }

    /// The bytes to publish.
    pub fn bytes<'a>(&'a self, source: &SourceImage<'a>) -> &'a [u8] {
        match self {
            Selected::Original => source.bytes,
            Selected::Optimized(result) => &result.bytes,
        }
    }
}

/// Keep whichever of {original, optimized} is smaller.
///
/// Only applies when the original can stand in for the output: same
/// container format, and that format is JPEG or WebP. Any other pairing
/// (PNG → JPEG, JPEG → AVIF, ...) always keeps the optimized output. Ties
/// keep the original.
pub fn choose_smaller(source: &SourceImage<'_>, optimized: OptimizationResult) -> Selected {
    let passthrough = matches!(optimized.format, OutputFormat::Jpeg | OutputFormat::WebP)
        && source.format == Some(optimized.format.image_format());

    if passthrough && source.len() <= optimized.optimized_size() {
        Selected::Original
    } else {
        Selected::Optimized(optimized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::{Dimensions, Quality};
    use crate::test_helpers::*;

    fn result(format: OutputFormat, size: usize, original: usize) -> OptimizationResult {
        OptimizationResult::new(
            vec![0u8; size],
            Dimensions {
                width: 10,
                height: 10,
            },
            &OptimizationRequest::new(format),
            original,
        )
    }

    #[test]
    fn source_image_sniffs_format() {
        let png = png_bytes(&gradient_image(8, 8));
        let jpeg = jpeg_bytes(&gradient_image(8, 8), 90);

        assert_eq!(SourceImage::new(&png).format, Some(ImageFormat::Png));
        assert_eq!(SourceImage::new(&jpeg).format, Some(ImageFormat::Jpeg));
        assert_eq!(SourceImage::new(b"garbage").format, None);
    }

    #[test]
    fn keeps_original_jpeg_when_smaller() {
        let jpeg = jpeg_bytes(&gradient_image(16, 16), 50);
        let source = SourceImage::new(&jpeg);

        let selected = choose_smaller(
            &source,
            result(OutputFormat::Jpeg, jpeg.len() + 100, jpeg.len()),
        );
        assert!(selected.is_original());
        assert_eq!(selected.bytes(&source), jpeg.as_slice());
    }

    #[test]
    fn keeps_original_on_tie() {
        let jpeg = jpeg_bytes(&gradient_image(16, 16), 50);
        let source = SourceImage::new(&jpeg);

        let selected = choose_smaller(&source, result(OutputFormat::Jpeg, jpeg.len(), jpeg.len()));
        assert!(selected.is_original());
    }

    #[test]
    fn keeps_optimized_when_smaller() {
        let jpeg = jpeg_bytes(&gradient_image(16, 16), 95);
        let source = SourceImage::new(&jpeg);

        let selected = choose_smaller(&source, result(OutputFormat::Jpeg, 10, jpeg.len()));
        assert!(!selected.is_original());
        assert_eq!(selected.bytes(&source).len(), 10);
    }

    #[test]
    fn format_change_always_keeps_optimized() {
        let png = png_bytes(&gradient_image(4, 4));
        let source = SourceImage::new(&png);

        // Larger JPEG from a tiny PNG still wins: a PNG cannot stand in for a JPEG
        let larger = result(OutputFormat::Jpeg, png.len() * 10, png.len());
        let selected = choose_smaller(&source, larger);
        assert!(!selected.is_original());
    }

    #[test]
    fn avif_never_passes_through() {
        let source = SourceImage {
            bytes: &[0u8; 10],
            format: Some(ImageFormat::Avif),
        };

        let selected = choose_smaller(&source, result(OutputFormat::Avif, 1_000, 10));
        assert!(!selected.is_original());
    }

    #[test]
    fn optimize_image_runs_search() {
        let backend = MockBackend::with_size_fn((2000, 1000), |req| {
            if req.quality.value() > 70 { 2_000_000 } else { 10_000 }
        });
        let input = vec![0u8; 3_000_000];
        let request = OptimizationRequest::new(OutputFormat::WebP)
            .with_width(1000)
            .with_quality(Quality::new(85));

        let out = optimize_image(
            &backend,
            &SourceImage::new(&input),
            &request,
            &CompressionPolicy::default(),
        )
        .unwrap();

        assert_eq!(backend.qualities(), vec![85, 70]);
        assert_eq!(out.result.format, OutputFormat::WebP);
        assert_eq!(out.result.dimensions, Dimensions::from((1000, 500)));
        assert_eq!(out.result.compression_ratio(), 100);
    }
}
