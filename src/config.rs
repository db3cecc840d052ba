//! Configuration module.
//!
//! Handles loading, validating, and merging `picture-press.toml`. Stock
//! defaults are serialized to a TOML table, the user file is merged on top
//! key by key, and the result is deserialized and validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compression]
//! default_quality = 85      # Starting quality for single-shot optimization
//! max_size_bytes = 819200   # Byte budget per encoded image (800 KiB)
//! min_quality = 60          # Quality floor of the search
//! max_attempts = 4          # Maximum encodes per image
//! quality_step = 15         # Quality decrease per attempt
//!
//! [assets]
//! managed_prefix = "/uploads/"  # URL prefix of pipeline-managed uploads
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [compression]
//! max_size_bytes = 409600
//! ```
//!
//! Unknown keys are rejected to catch typos early. The responsive breakpoint
//! table is fixed and deliberately absent from the config.

use crate::compress::{DEFAULT_QUALITY, MAX_ATTEMPTS, MAX_SIZE_BYTES, MIN_QUALITY, QUALITY_STEP};
use crate::naming::DEFAULT_MANAGED_PREFIX;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PressConfig {
    /// Quality search settings.
    pub compression: CompressionConfig,
    /// Managed asset path settings.
    pub assets: AssetsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PressConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.compression;
        if !(1..=100).contains(&c.default_quality) {
            return Err(ConfigError::Validation(
                "compression.default_quality must be 1-100".into(),
            ));
        }
        if !(1..=100).contains(&c.min_quality) {
            return Err(ConfigError::Validation(
                "compression.min_quality must be 1-100".into(),
            ));
        }
        if c.min_quality > c.default_quality {
            return Err(ConfigError::Validation(
                "compression.min_quality must not exceed compression.default_quality".into(),
            ));
        }
        if c.max_size_bytes == 0 {
            return Err(ConfigError::Validation(
                "compression.max_size_bytes must be positive".into(),
            ));
        }
        if c.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "compression.max_attempts must be at least 1".into(),
            ));
        }
        if c.quality_step == 0 {
            return Err(ConfigError::Validation(
                "compression.quality_step must be at least 1".into(),
            ));
        }
        if self.assets.managed_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "assets.managed_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Quality search settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Starting quality when a request does not specify one.
    pub default_quality: u32,
    /// Byte budget for one encoded image.
    pub max_size_bytes: usize,
    /// The search never goes below this quality.
    pub min_quality: u32,
    /// Maximum number of encodes per image.
    pub max_attempts: u32,
    /// Quality decrease between attempts.
    pub quality_step: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            default_quality: DEFAULT_QUALITY.value(),
            max_size_bytes: MAX_SIZE_BYTES,
            min_quality: MIN_QUALITY.value(),
            max_attempts: MAX_ATTEMPTS,
            quality_step: QUALITY_STEP,
        }
    }
}

/// Managed asset settings, consumed by the naming convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// URL prefix under which uploads get derived `<picture>` candidates.
    pub managed_prefix: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            managed_prefix: DEFAULT_MANAGED_PREFIX.to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PressConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PressConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PressConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file.
///
/// A missing file is not an error: `None` or a nonexistent path yields the
/// validated stock defaults.
pub fn load_config(path: Option<&Path>) -> Result<PressConfig, ConfigError> {
    let overlay = match path {
        Some(p) if p.exists() => {
            let content = fs::read_to_string(p)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        _ => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# picture-press configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Quality search
# ---------------------------------------------------------------------------
[compression]
# Starting quality when a request does not specify one (1-100).
default_quality = 85

# Byte budget for one encoded image. The search lowers quality until the
# output fits, or until the floor or the attempt limit is reached.
max_size_bytes = 819200

# Lowest quality the search will try (1-100).
min_quality = 60

# Maximum number of encodes per image.
max_attempts = 4

# Quality decrease between attempts.
quality_step = 15

# ---------------------------------------------------------------------------
# Managed assets
# ---------------------------------------------------------------------------
[assets]
# URL prefix of uploaded images that have derived <picture> candidates.
managed_prefix = "/uploads/"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
