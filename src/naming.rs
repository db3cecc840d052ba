//! Filename convention shared with the rendering layer.
//!
//! Pages that render `<picture>` markup only know the path of the image the
//! editor picked, which may be the original upload or any derived file. They
//! rebuild the candidate set from that path alone:
//!
//! ```text
//! /uploads/hero-desktop.jpg
//!   → base  /uploads/hero
//!   → /uploads/hero-mobile.webp   image/webp
//!     /uploads/hero-mobile.jpg    image/jpeg
//!     /uploads/hero.avif          image/avif
//!     /uploads/hero.webp          image/webp
//!     /uploads/hero-desktop.jpg   image/jpeg
//!     /uploads/hero-tablet.jpg    image/jpeg
//!     /uploads/hero-optimized.jpg image/jpeg
//!   fallback /uploads/hero-desktop.jpg
//! ```
//!
//! Paths outside the managed uploads prefix are not ours: they get no
//! candidates and the source is used unmodified. The suffixes, extensions
//! and candidate order are a contract with existing templates and must not
//! change.

/// Default prefix of uploaded, pipeline-managed assets.
pub const DEFAULT_MANAGED_PREFIX: &str = "/uploads/";

/// Extensions stripped when deriving the base path (matched case-insensitively).
const KNOWN_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".avif", ".gif"];

/// Derived-file suffixes stripped after the extension.
const KNOWN_SUFFIXES: &[&str] = &["-optimized", "-desktop", "-tablet", "-mobile"];

/// Candidate suffixes appended to the base path, in preference order.
const CANDIDATES: &[(&str, &str)] = &[
    ("-mobile.webp", "image/webp"),
    ("-mobile.jpg", "image/jpeg"),
    (".avif", "image/avif"),
    (".webp", "image/webp"),
    ("-desktop.jpg", "image/jpeg"),
    ("-tablet.jpg", "image/jpeg"),
    ("-optimized.jpg", "image/jpeg"),
];

/// One `<source>` candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureCandidate {
    pub path: String,
    pub mime_type: &'static str,
}

/// Everything a template needs to render one `<picture>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureSources {
    /// Derived candidates; empty for unmanaged sources.
    pub candidates: Vec<PictureCandidate>,
    /// The `<img>` fallback: always the source path as given.
    pub fallback: String,
}

impl PictureSources {
    pub fn is_managed(&self) -> bool {
        !self.candidates.is_empty()
    }
}

/// Whether `src` lives under the managed uploads prefix.
pub fn is_managed(src: &str, managed_prefix: &str) -> bool {
    !managed_prefix.is_empty() && src.starts_with(managed_prefix)
}

/// Strip one known extension, then one known derived-file suffix.
///
/// - `"/uploads/hero-desktop.jpg"` → `"/uploads/hero"`
/// - `"/uploads/hero.WEBP"` → `"/uploads/hero"`
/// - `"/uploads/hero-optimized"` → `"/uploads/hero"`
/// - `"/uploads/hero.svg"` → `"/uploads/hero.svg"` (unknown extension kept)
pub fn base_path(src: &str) -> &str {
    let without_ext = KNOWN_EXTENSIONS
        .iter()
        .find_map(|ext| strip_suffix_ignore_case(src, ext))
        .unwrap_or(src);

    strip_derived_suffix(without_ext)
}

/// Strip one known derived-file suffix (`-mobile`, `-optimized`, ...), if any.
///
/// Works on a bare stem, so callers that already removed an extension of
/// their own can still recognize derived names.
pub fn strip_derived_suffix(stem: &str) -> &str {
    KNOWN_SUFFIXES
        .iter()
        .find_map(|suffix| stem.strip_suffix(suffix))
        .unwrap_or(stem)
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    if !s.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = s.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

/// Build the candidate list for `src`.
pub fn picture_sources(src: &str, managed_prefix: &str) -> PictureSources {
    if !is_managed(src, managed_prefix) {
        return PictureSources {
            candidates: Vec::new(),
            fallback: src.to_string(),
        };
    }

    let base = base_path(src);
    let candidates = CANDIDATES
        .iter()
        .map(|&(suffix, mime_type)| PictureCandidate {
            path: format!("{base}{suffix}"),
            mime_type,
        })
        .collect();

    PictureSources {
        candidates,
        fallback: src.to_string(),
    }
}
