//! End-to-end checks of the public API with the real codecs.
//!
//! Fixtures are generated in memory. Noise images are used where the size
//! budget must actually bite, since gradients compress to almost nothing.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use picture_press::compress::{CompressionPolicy, SearchState};
use picture_press::imaging::{
    BackendError, CodecBackend, Dimensions, OptimizationRequest, OutputFormat, Quality,
};
use picture_press::naming::{DEFAULT_MANAGED_PREFIX, picture_sources};
use picture_press::optimize::{SourceImage, choose_smaller, optimize_image};
use picture_press::variants::{Variant, VariantError, create_responsive_versions};
use std::io::Cursor;

fn noise(width: u32, height: u32) -> DynamicImage {
    let mut state: u32 = 0x9E37_79B9;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        (state & 0xFF) as u8
    };
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
        Rgb([next(), next(), next()])
    }))
}

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn decoded_dimensions(bytes: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(bytes).unwrap();
    (img.width(), img.height())
}

#[test]
fn optimize_png_to_jpeg_with_resize() {
    let png = encode(&gradient(800, 600), ImageFormat::Png);
    let request = OptimizationRequest::new(OutputFormat::Jpeg).with_width(400);

    let out = optimize_image(
        &CodecBackend::new(),
        &SourceImage::new(&png),
        &request,
        &CompressionPolicy::default(),
    )
    .unwrap();

    assert_eq!(out.state, SearchState::Converged);
    assert_eq!(out.attempts, 1);
    assert_eq!(out.result.dimensions, Dimensions::from((400, 300)));
    assert_eq!(image::guess_format(&out.result.bytes).unwrap(), ImageFormat::Jpeg);
    assert_eq!(decoded_dimensions(&out.result.bytes), (400, 300));
    assert_eq!(out.result.original_size, png.len());
}

#[test]
fn oversized_noise_steps_quality_down() {
    // Noise at 1200x900 is well above a 100 KB budget at q85
    let png = encode(&noise(1200, 900), ImageFormat::Png);
    let policy = CompressionPolicy {
        max_size_bytes: 100 * 1024,
        ..CompressionPolicy::default()
    };
    let request = OptimizationRequest::new(OutputFormat::Jpeg).with_quality(Quality::new(85));

    let out = optimize_image(&CodecBackend::new(), &SourceImage::new(&png), &request, &policy)
        .unwrap();

    assert!(out.attempts > 1);
    assert!(out.attempts <= policy.max_attempts);
    assert!(out.result.quality < Quality::new(85));
    if out.state == SearchState::Converged {
        assert!(out.result.optimized_size() <= policy.max_size_bytes);
    }
}

#[test]
fn corrupt_input_is_decode_error() {
    let err = optimize_image(
        &CodecBackend::new(),
        &SourceImage::new(b"definitely not an image"),
        &OptimizationRequest::default(),
        &CompressionPolicy::default(),
    )
    .unwrap_err();

    assert!(matches!(err, BackendError::Decode(_)));
}

#[test]
fn responsive_bundle_from_hero_image() {
    let png = encode(&gradient(1500, 1000), ImageFormat::Png);
    let bundle = create_responsive_versions(
        &CodecBackend::new(),
        &SourceImage::new(&png),
        "hero",
        &CompressionPolicy::default(),
    )
    .unwrap();

    let expected = [
        (Variant::Mobile, "hero-mobile.jpg", (480, 320), ImageFormat::Jpeg),
        (Variant::Tablet, "hero-tablet.jpg", (768, 512), ImageFormat::Jpeg),
        (Variant::Desktop, "hero-desktop.jpg", (1200, 800), ImageFormat::Jpeg),
        (Variant::WebP, "hero.webp", (1200, 800), ImageFormat::WebP),
    ];
    for (variant, filename, dims, format) in expected {
        let file = bundle.get(variant);
        assert_eq!(file.filename, filename);
        assert_eq!(file.dimensions, Dimensions::from(dims), "{variant}");
        assert_eq!(image::guess_format(&file.buffer).unwrap(), format, "{variant}");
        assert_eq!(decoded_dimensions(&file.buffer), dims, "{variant}");
    }
}

#[test]
fn small_source_is_never_upscaled() {
    let png = encode(&gradient(300, 200), ImageFormat::Png);
    let bundle = create_responsive_versions(
        &CodecBackend::new(),
        &SourceImage::new(&png),
        "thumb",
        &CompressionPolicy::default(),
    )
    .unwrap();

    for (variant, file) in bundle.iter() {
        assert_eq!(file.dimensions, Dimensions::from((300, 200)), "{variant}");
    }
}

#[test]
fn corrupt_input_fails_whole_bundle() {
    let err = create_responsive_versions(
        &CodecBackend::new(),
        &SourceImage::new(&[0xFF, 0xD8, 0xFF, 0x00]),
        "broken",
        &CompressionPolicy::default(),
    )
    .unwrap_err();

    let VariantError::OptimizationFailed { source, .. } = err;
    assert!(matches!(source, BackendError::Decode(_)));
}

#[test]
fn reoptimizing_keeps_format_and_dimensions() {
    let png = encode(&gradient(640, 480), ImageFormat::Png);
    let request = OptimizationRequest::new(OutputFormat::WebP).with_width(320);
    let backend = CodecBackend::new();
    let policy = CompressionPolicy::default();

    let first = optimize_image(&backend, &SourceImage::new(&png), &request, &policy).unwrap();
    let second = optimize_image(
        &backend,
        &SourceImage::new(&first.result.bytes),
        &request,
        &policy,
    )
    .unwrap();

    assert_eq!(first.result.dimensions, second.result.dimensions);
    assert_eq!(first.result.format, second.result.format);
    assert_eq!(
        image::guess_format(&second.result.bytes).unwrap(),
        ImageFormat::WebP
    );
}

#[test]
fn keep_smaller_prefers_compact_original_jpeg() {
    let original = encode(&gradient(200, 150), ImageFormat::Jpeg);
    let source = SourceImage::new(&original);
    let request = OptimizationRequest::new(OutputFormat::Jpeg).with_quality(Quality::new(100));

    let out = optimize_image(&CodecBackend::new(), &source, &request, &CompressionPolicy::default())
        .unwrap();
    let grew = out.result.optimized_size() >= original.len();
    let selected = choose_smaller(&source, out.result);

    assert_eq!(selected.is_original(), grew);
    if selected.is_original() {
        assert_eq!(selected.bytes(&source), original.as_slice());
    } else {
        assert!(selected.bytes(&source).len() < original.len());
    }
}

#[test]
fn picture_sources_cover_generated_bundle() {
    let sources = picture_sources("/uploads/hero-desktop.jpg", DEFAULT_MANAGED_PREFIX);
    let paths: Vec<&str> = sources.candidates.iter().map(|c| c.path.as_str()).collect();

    for variant in [Variant::Mobile, Variant::Tablet, Variant::Desktop, Variant::WebP] {
        let path = format!("/uploads/{}", variant.filename("hero"));
        assert!(paths.contains(&path.as_str()), "{path}");
    }
}
