//! Batch driver: run the pipeline over every image in a directory.
//!
//! This is a caller of the core, not part of it. It owns what the core
//! refuses to: file discovery, persistence, and the per-asset failure policy.
//! A failing asset is logged, reported and skipped; it never aborts the run.
//!
//! ## Modes
//!
//! - **Responsive**: write the four-file bundle for each image.
//! - **Optimize**: single-shot optimize each image, then apply
//!   [`choose_smaller`] so an already well-compressed JPEG/WebP is copied
//!   through instead of being replaced by a larger re-encode.
//!
//! ## Output Structure
//!
//! ```text
//! out/
//! ├── report.json                # BatchReport
//! ├── hero-mobile.jpg            # responsive mode
//! ├── hero-tablet.jpg
//! ├── hero-desktop.jpg
//! ├── hero.webp
//! └── events/
//!     └── poster-optimized.jpg   # optimize mode, directory structure mirrored
//! ```
//!
//! ## Parallel Processing
//!
//! Assets are processed in parallel using [rayon](https://docs.rs/rayon).
//! Progress is reported through an optional channel so the CLI can print
//! from a single thread.

use crate::compress::CompressionPolicy;
use crate::imaging::{ImageBackend, OptimizationRequest};
use crate::naming;
use crate::optimize::{Selected, SourceImage, choose_smaller, optimize_image};
use crate::variants::create_responsive_versions;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Input extensions the batch driver picks up (matched case-insensitively).
const INPUT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tif", "tiff", "gif", "bmp"];

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    #[default]
    Responsive,
    Optimize,
}

/// What to do with each discovered image.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub mode: BatchMode,
    /// Target for optimize mode; ignored in responsive mode.
    pub request: OptimizationRequest,
    pub policy: CompressionPolicy,
}

/// One file written for an asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WrittenFile {
    /// Path relative to the output directory.
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub size: usize,
    pub quality: u32,
}

/// A successfully processed asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetReport {
    /// Path relative to the input directory.
    pub source: String,
    pub original_size: usize,
    pub files: Vec<WrittenFile>,
    /// Optimize mode only: the original bytes were kept.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub kept_original: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedAsset {
    pub source: String,
    pub error: String,
}

/// Progress event, sent once per asset.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Processed(AssetReport),
    Failed(FailedAsset),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub mode: BatchMode,
    pub processed: Vec<AssetReport>,
    pub failed: Vec<FailedAsset>,
}

impl BatchReport {
    pub fn total_original(&self) -> usize {
        self.processed.iter().map(|a| a.original_size).sum()
    }

    pub fn total_written(&self) -> usize {
        self.processed
            .iter()
            .flat_map(|a| &a.files)
            .map(|f| f.size)
            .sum()
    }
}

fn has_input_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| INPUT_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Whether a filename is one of our own derived outputs (`-mobile.jpg`, ...).
///
/// Only the derived suffix is checked: any input extension counts, not just
/// the ones the `<picture>` naming convention knows about.
fn is_derived(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| naming::strip_derived_suffix(stem) != stem)
}

/// Find source images under `input_dir`, sorted, skipping `exclude` and
/// files that look like derived outputs.
pub fn discover_images(
    input_dir: &Path,
    exclude: Option<&Path>,
) -> Result<Vec<PathBuf>, BatchError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(input_dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if exclude.is_some_and(|ex| path.starts_with(ex)) {
            continue;
        }
        if entry.file_type().is_file() && has_input_extension(path) && !is_derived(path) {
            found.push(path.to_path_buf());
        }
    }
    Ok(found)
}

/// A discovered source with the base name its outputs are written under.
#[derive(Debug, Clone, PartialEq)]
struct PlannedAsset {
    path: PathBuf,
    relative: PathBuf,
    base_name: String,
}

/// Assign output base names, keeping outputs of different sources apart.
///
/// The base name is the file stem. Sources sharing a stem in one directory
/// (`hero.png`, `hero.jpg`) get the extension appended (`hero-png`,
/// `hero-jpg`). Comparison ignores case so names stay distinct on
/// case-insensitive filesystems; a source whose name still clashes is
/// rejected instead of overwriting another source's files.
fn plan_outputs(
    input_dir: &Path,
    sources: &[PathBuf],
) -> (Vec<PlannedAsset>, Vec<FailedAsset>) {
    let key = |relative: &Path, name: &str| {
        (
            relative.parent().map(Path::to_path_buf).unwrap_or_default(),
            name.to_lowercase(),
        )
    };

    let entries: Vec<(PathBuf, PathBuf, Option<(String, String)>)> = sources
        .iter()
        .map(|path| {
            let relative = path.strip_prefix(input_dir).unwrap_or(path).to_path_buf();
            let parts = relative
                .file_stem()
                .and_then(|s| s.to_str())
                .zip(relative.extension().and_then(|e| e.to_str()))
                .map(|(stem, ext)| (stem.to_string(), ext.to_lowercase()));
            (path.clone(), relative, parts)
        })
        .collect();

    let mut stem_counts: HashMap<(PathBuf, String), usize> = HashMap::new();
    for (_, relative, parts) in &entries {
        if let Some((stem, _)) = parts {
            *stem_counts.entry(key(relative, stem)).or_default() += 1;
        }
    }

    let mut planned = Vec::new();
    let mut rejected = Vec::new();
    let mut taken: HashMap<(PathBuf, String), String> = HashMap::new();
    for (path, relative, parts) in entries {
        let source = relative.display().to_string();
        let Some((stem, ext)) = parts else {
            rejected.push(FailedAsset {
                source,
                error: "file name is not valid UTF-8".to_string(),
            });
            continue;
        };
        let base_name = if stem_counts[&key(&relative, &stem)] > 1 {
            format!("{stem}-{ext}")
        } else {
            stem
        };
        if let Some(owner) = taken.get(&key(&relative, &base_name)) {
            rejected.push(FailedAsset {
                error: format!("output name {base_name} already used by {owner}"),
                source,
            });
            continue;
        }
        taken.insert(key(&relative, &base_name), source);
        planned.push(PlannedAsset {
            path,
            relative,
            base_name,
        });
    }
    (planned, rejected)
}

/// Write a set of files so that either all of them end up in `dir` or none.
///
/// Each file is written to a hidden temporary name first and renamed into
/// place once every write succeeded. On any failure the temporaries and the
/// files already renamed are removed.
pub fn publish_files(dir: &Path, files: &[(&str, &[u8])]) -> std::io::Result<()> {
    let staged: Vec<(PathBuf, PathBuf)> = files
        .iter()
        .map(|(name, _)| (dir.join(format!(".{name}.tmp")), dir.join(name)))
        .collect();

    let cleanup = |upto_renamed: usize| {
        for (i, (tmp, target)) in staged.iter().enumerate() {
            let leftover = if i < upto_renamed { target } else { tmp };
            let _ = std::fs::remove_file(leftover);
        }
    };

    for ((tmp, _), (_, data)) in staged.iter().zip(files) {
        if let Err(e) = std::fs::write(tmp, data) {
            cleanup(0);
            return Err(e);
        }
    }
    for (i, (tmp, target)) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(tmp, target) {
            cleanup(i);
            return Err(e);
        }
    }
    Ok(())
}

/// Process every image under `input_dir`, writing results to `output_dir`.
///
/// Only directory-level problems (unreadable input tree, unwritable report)
/// fail the call. Per-asset failures end up in [`BatchReport::failed`].
pub fn run_batch(
    backend: &impl ImageBackend,
    input_dir: &Path,
    output_dir: &Path,
    options: &BatchOptions,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchReport, BatchError> {
    std::fs::create_dir_all(output_dir)?;
    // Canonical paths so a relative out dir nested in the input is still excluded
    let input_dir = &input_dir.canonicalize()?;
    let output_root = output_dir.canonicalize()?;
    let exclude = (output_root != *input_dir).then_some(output_root.as_path());
    let sources = discover_images(input_dir, exclude)?;
    info!(count = sources.len(), mode = ?options.mode, "batch started");

    let emit = |event: BatchEvent| {
        if let Some(tx) = &events {
            // Printer may have gone away; the report still has everything
            let _ = tx.send(event.clone());
        }
        event
    };

    let (planned, rejected) = plan_outputs(input_dir, &sources);
    let mut outcomes: Vec<BatchEvent> = rejected
        .into_iter()
        .map(|failed| {
            warn!(source = %failed.source, error = %failed.error, "asset skipped");
            emit(BatchEvent::Failed(failed))
        })
        .collect();

    outcomes.par_extend(planned.par_iter().map(|asset| {
        let event = match process_asset(backend, asset, output_dir, options) {
            Ok(report) => {
                info!(source = %report.source, files = report.files.len(), "asset processed");
                BatchEvent::Processed(report)
            }
            Err(error) => {
                warn!(source = %asset.relative.display(), %error, "asset failed, skipping");
                BatchEvent::Failed(FailedAsset {
                    source: asset.relative.display().to_string(),
                    error,
                })
            }
        };
        emit(event)
    }));

    let mut report = BatchReport {
        mode: options.mode,
        ..BatchReport::default()
    };
    for outcome in outcomes {
        match outcome {
            BatchEvent::Processed(asset) => report.processed.push(asset),
            BatchEvent::Failed(failed) => report.failed.push(failed),
        }
    }

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(output_dir.join("report.json"), json)?;
    Ok(report)
}

/// Process one asset. Errors are flattened to strings for the report.
fn process_asset(
    backend: &impl ImageBackend,
    asset: &PlannedAsset,
    output_dir: &Path,
    options: &BatchOptions,
) -> Result<AssetReport, String> {
    let bytes = std::fs::read(&asset.path).map_err(|e| format!("read failed: {e}"))?;
    let source = SourceImage::new(&bytes);
    let base_name = asset.base_name.as_str();

    let relative_dir = asset.relative.parent().unwrap_or(Path::new(""));
    let target_dir = output_dir.join(relative_dir);
    std::fs::create_dir_all(&target_dir).map_err(|e| format!("create dir failed: {e}"))?;
    let output_path = |filename: &str| relative_dir.join(filename).to_string_lossy().into_owned();

    match options.mode {
        BatchMode::Responsive => {
            let bundle = create_responsive_versions(backend, &source, base_name, &options.policy)
                .map_err(|e| e.to_string())?;
            let contents: Vec<(&str, &[u8])> = bundle
                .iter()
                .map(|(_, file)| (file.filename.as_str(), file.buffer.as_slice()))
                .collect();
            publish_files(&target_dir, &contents)
                .map_err(|e| format!("writing {base_name} bundle failed: {e}"))?;

            let files = bundle
                .iter()
                .map(|(_, file)| WrittenFile {
                    path: output_path(&file.filename),
                    width: file.dimensions.width,
                    height: file.dimensions.height,
                    size: file.buffer.len(),
                    quality: file.quality.value(),
                })
                .collect();
            Ok(AssetReport {
                source: asset.relative.display().to_string(),
                original_size: bytes.len(),
                files,
                kept_original: false,
            })
        }
        BatchMode::Optimize => {
            let compressed = optimize_image(backend, &source, &options.request, &options.policy)
                .map_err(|e| e.to_string())?;
            let extension = compressed.result.format.extension();
            let dimensions = compressed.result.dimensions;
            let quality = compressed.result.quality.value();

            let selected = choose_smaller(&source, compressed.result);
            let data = selected.bytes(&source);
            let filename = format!("{base_name}-optimized.{extension}");
            publish_files(&target_dir, &[(filename.as_str(), data)])
                .map_err(|e| format!("write {filename} failed: {e}"))?;
            let file = WrittenFile {
                path: output_path(&filename),
                width: dimensions.width,
                height: dimensions.height,
                size: data.len(),
                quality,
            };
            Ok(AssetReport {
                source: asset.relative.display().to_string(),
                original_size: bytes.len(),
                files: vec![file],
                kept_original: matches!(selected, Selected::Original),
            })
        }
    }
}
