//! Responsive variant generation.
//!
//! Turns one source image into the complete set of files a `<picture>`
//! element needs, under one base name:
//!
//! ```text
//! hero-mobile.jpg    480px  JPEG  q80
//! hero-tablet.jpg    768px  JPEG  q85
//! hero-desktop.jpg  1200px  JPEG  q90
//! hero.webp         1200px  WebP  q85
//! ```
//!
//! Each row is an independent [`compress`] run with the listed width as a
//! fit-inside box and the listed quality as the starting point of the search.
//!
//! ## All or nothing
//!
//! Rendered markup references all four files, so a bundle with a missing
//! entry would produce broken `srcset` candidates. [`VariantBundle`] therefore
//! has one field per variant and cannot be built partially: if any job fails,
//! [`create_responsive_versions`] returns that error and every already
//! encoded variant is dropped.
//!
//! ## Parallel Processing
//!
//! The four jobs share nothing but the read-only input and backend. They run
//! on the rayon pool as nested `rayon::join`s, one slot per variant, and are
//! all joined before the call returns.

use crate::compress::{CompressionPolicy, compress};
use crate::imaging::{
    BackendError, Dimensions, ImageBackend, OptimizationRequest, OutputFormat, Quality,
};
use crate::optimize::SourceImage;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum VariantError {
    #[error("optimization failed for {variant} variant: {source}")]
    OptimizationFailed {
        variant: Variant,
        #[source]
        source: BackendError,
    },
}

/// Logical name of one entry in a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Mobile,
    Tablet,
    Desktop,
    WebP,
}

impl Variant {
    pub fn name(self) -> &'static str {
        match self {
            Variant::Mobile => "mobile",
            Variant::Tablet => "tablet",
            Variant::Desktop => "desktop",
            Variant::WebP => "webp",
        }
    }

    /// Output filename for this variant under `base_name`.
    ///
    /// JPEG variants carry the variant name as a suffix; the WebP variant is
    /// the bare base name. Consumers rebuild these names from the source
    /// path, see [`naming`](crate::naming).
    pub fn filename(self, base_name: &str) -> String {
        match self {
            Variant::WebP => format!("{base_name}.webp"),
            jpeg => format!("{base_name}-{}.jpg", jpeg.name()),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the breakpoint table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    pub variant: Variant,
    pub width: u32,
    pub format: OutputFormat,
    pub quality: Quality,
}

impl Breakpoint {
    pub fn request(&self) -> OptimizationRequest {
        OptimizationRequest::new(self.format)
            .with_width(self.width)
            .with_quality(self.quality)
    }
}

/// The fixed breakpoint table, in bundle order.
pub const BREAKPOINTS: [Breakpoint; 4] = [
    Breakpoint {
        variant: Variant::Mobile,
        width: 480,
        format: OutputFormat::Jpeg,
        quality: Quality(80),
    },
    Breakpoint {
        variant: Variant::Tablet,
        width: 768,
        format: OutputFormat::Jpeg,
        quality: Quality(85),
    },
    Breakpoint {
        variant: Variant::Desktop,
        width: 1200,
        format: OutputFormat::Jpeg,
        quality: Quality(90),
    },
    Breakpoint {
        variant: Variant::WebP,
        width: 1200,
        format: OutputFormat::WebP,
        quality: Quality(85),
    },
];

/// One encoded file of a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantFile {
    pub filename: String,
    pub buffer: Vec<u8>,
    pub dimensions: Dimensions,
    /// Quality the search settled on.
    pub quality: Quality,
}

/// The complete set of derived files for one source image.
#[derive(Debug, Clone)]
pub struct VariantBundle {
    pub base_name: String,
    pub mobile: VariantFile,
    pub tablet: VariantFile,
    pub desktop: VariantFile,
    pub webp: VariantFile,
}

impl VariantBundle {
    pub fn get(&self, variant: Variant) -> &VariantFile {
        match variant {
            Variant::Mobile => &self.mobile,
            Variant::Tablet => &self.tablet,
            Variant::Desktop => &self.desktop,
            Variant::WebP => &self.webp,
        }
    }

    /// Entries in breakpoint-table order.
    pub fn iter(&self) -> impl Iterator<Item = (Variant, &VariantFile)> {
        BREAKPOINTS.iter().map(|bp| (bp.variant, self.get(bp.variant)))
    }

    /// Sum of all encoded sizes.
    pub fn total_size(&self) -> usize {
        self.iter().map(|(_, file)| file.buffer.len()).sum()
    }
}

/// Encode every breakpoint of `source` and assemble the bundle.
///
/// Fails with [`VariantError::OptimizationFailed`] naming the failed variant,
/// checked in table order when several fail; no partial bundle is returned.
pub fn create_responsive_versions(
    backend: &impl ImageBackend,
    source: &SourceImage<'_>,
    base_name: &str,
    policy: &CompressionPolicy,
) -> Result<VariantBundle, VariantError> {
    let job = |bp: &Breakpoint| -> Result<VariantFile, VariantError> {
        let compressed = compress(backend, source.bytes, &bp.request(), policy).map_err(
            |source| VariantError::OptimizationFailed {
                variant: bp.variant,
                source,
            },
        )?;
        let result = compressed.result;
        Ok(VariantFile {
            filename: bp.variant.filename(base_name),
            dimensions: result.dimensions,
            quality: result.quality,
            buffer: result.bytes,
        })
    };

    let [mobile, tablet, desktop, webp] = &BREAKPOINTS;
    let ((mobile, tablet), (desktop, webp)) = rayon::join(
        || rayon::join(|| job(mobile), || job(tablet)),
        || rayon::join(|| job(desktop), || job(webp)),
    );

    let bundle = VariantBundle {
        base_name: base_name.to_string(),
        mobile: mobile?,
        tablet: tablet?,
        desktop: desktop?,
        webp: webp?,
    };
    info!(
        base_name,
        original = source.bytes.len(),
        total = bundle.total_size(),
        "responsive bundle created"
    );
    Ok(bundle)
}
