//! CLI output formatting for every command.
//!
//! # Result-First Display
//!
//! Each entity leads with what was produced (variant, format, dimensions,
//! size), with the source and the search outcome shown as indented context
//! lines. Sizes are human-readable; ratios are the integer percent saved.
//!
//! # Output Format
//!
//! ## Optimize
//!
//! ```text
//! hero.png → hero-optimized.jpg
//!     jpeg 1920x1280 q70: 2.4 MB → 612.0 KB (75% saved)
//!     Search: converged after 2 attempts
//! ```
//!
//! ## Responsive
//!
//! ```text
//! hero (4 files, 1.1 MB)
//!     mobile   hero-mobile.jpg   480x320   q80   48.2 KB
//!     tablet   hero-tablet.jpg   768x512   q85   101.7 KB
//!     desktop  hero-desktop.jpg  1200x800  q90   312.9 KB
//!     webp     hero.webp         1200x800  q85   201.3 KB
//! ```
//!
//! ## Batch
//!
//! ```text
//! ✓ events/poster.png (4 files)
//! ✗ broken.jpg: decode failed: ...
//!
//! Processed 12 assets, 1 failed: 48.3 MB → 9.1 MB
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::batch::{BatchEvent, BatchReport};
use crate::compress::{Compressed, SearchState};
use crate::imaging::compression_ratio;
use crate::naming::PictureSources;
use crate::variants::VariantBundle;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a byte count with a binary unit, one decimal above bytes.
fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// "75% saved", or "12% larger" when the output grew.
fn format_ratio(original: usize, written: usize) -> String {
    let ratio = compression_ratio(original, written);
    if ratio >= 0 {
        format!("{ratio}% saved")
    } else {
        format!("{}% larger", -ratio)
    }
}

fn state_label(state: SearchState, attempts: u32) -> String {
    let plural = if attempts == 1 { "" } else { "s" };
    match state {
        SearchState::Converged => format!("converged after {attempts} attempt{plural}"),
        SearchState::QualityFloor => {
            format!("stopped at quality floor after {attempts} attempt{plural}")
        }
        SearchState::AttemptsExhausted => format!("attempt limit reached ({attempts})"),
        SearchState::Searching => format!("searching ({attempts})"),
    }
}

// ============================================================================
// optimize
// ============================================================================

/// Format the outcome of a single-shot optimize.
///
/// `kept_original` means the keep-smaller rule left the source bytes in place.
pub fn format_optimize_output(
    source_name: &str,
    output_name: &str,
    compressed: &Compressed,
    kept_original: bool,
) -> Vec<String> {
    let result = &compressed.result;
    let mut lines = vec![format!("{source_name} \u{2192} {output_name}")];
    if kept_original {
        lines.push(format!(
            "    Original kept: {} \u{2264} {} re-encoded",
            format_size(result.original_size),
            format_size(result.optimized_size())
        ));
    } else {
        lines.push(format!(
            "    {} {}x{} q{}: {} \u{2192} {} ({})",
            result.format,
            result.dimensions.width,
            result.dimensions.height,
            result.quality,
            format_size(result.original_size),
            format_size(result.optimized_size()),
            format_ratio(result.original_size, result.optimized_size())
        ));
    }
    lines.push(format!(
        "    Search: {}",
        state_label(compressed.state, compressed.attempts)
    ));
    lines
}

pub fn print_optimize_output(
    source_name: &str,
    output_name: &str,
    compressed: &Compressed,
    kept_original: bool,
) {
    for line in format_optimize_output(source_name, output_name, compressed, kept_original) {
        println!("{line}");
    }
}

// ============================================================================
// responsive
// ============================================================================

/// Format a finished bundle as an aligned table, one line per variant.
pub fn format_bundle(bundle: &VariantBundle) -> Vec<String> {
    let rows: Vec<[String; 5]> = bundle
        .iter()
        .map(|(variant, file)| {
            [
                variant.name().to_string(),
                file.filename.clone(),
                format!("{}x{}", file.dimensions.width, file.dimensions.height),
                format!("q{}", file.quality),
                format_size(file.buffer.len()),
            ]
        })
        .collect();

    let mut widths = [0usize; 4];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = vec![format!(
        "{} ({} files, {})",
        bundle.base_name,
        rows.len(),
        format_size(bundle.total_size())
    )];
    for [name, filename, dims, quality, size] in &rows {
        lines.push(format!(
            "    {name:<w0$}  {filename:<w1$}  {dims:<w2$}  {quality:<w3$}  {size}",
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        ));
    }
    lines
}

pub fn print_bundle(bundle: &VariantBundle) {
    for line in format_bundle(bundle) {
        println!("{line}");
    }
}

// ============================================================================
// batch
// ============================================================================

/// Format a single batch progress event.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Processed(asset) => {
            let count = asset.files.len();
            let noun = if count == 1 { "file" } else { "files" };
            let mut lines = vec![format!("\u{2713} {} ({count} {noun})", asset.source)];
            if asset.kept_original {
                lines.push("    original kept".to_string());
            }
            lines
        }
        BatchEvent::Failed(failed) => {
            vec![format!("\u{2717} {}: {}", failed.source, failed.error)]
        }
    }
}

/// Format the closing summary of a batch run.
pub fn format_batch_summary(report: &BatchReport) -> Vec<String> {
    let processed = report.processed.len();
    let noun = if processed == 1 { "asset" } else { "assets" };
    let mut summary = format!("Processed {processed} {noun}");
    if !report.failed.is_empty() {
        summary.push_str(&format!(", {} failed", report.failed.len()));
    }
    if processed > 0 {
        summary.push_str(&format!(
            ": {} \u{2192} {}",
            format_size(report.total_original()),
            format_size(report.total_written())
        ));
    }
    vec![String::new(), summary]
}

pub fn print_batch_summary(report: &BatchReport) {
    for line in format_batch_summary(report) {
        println!("{line}");
    }
}

// ============================================================================
// sources
// ============================================================================

/// Format the `<picture>` candidates for one path.
pub fn format_picture_sources(sources: &PictureSources) -> Vec<String> {
    if !sources.is_managed() {
        return vec![format!("{} (unmanaged, used as-is)", sources.fallback)];
    }
    let width = sources
        .candidates
        .iter()
        .map(|c| c.mime_type.len())
        .max()
        .unwrap_or(0);
    let mut lines: Vec<String> = sources
        .candidates
        .iter()
        .map(|c| format!("{:<width$}  {}", c.mime_type, c.path))
        .collect();
    lines.push(format!("{:<width$}  {}", "fallback", sources.fallback));
    lines
}

pub fn print_picture_sources(sources: &PictureSources) {
    for line in format_picture_sources(sources) {
        println!("{line}");
    }
}
