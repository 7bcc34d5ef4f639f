//! Gallery configuration.
//!
//! A single `behappy.toml` describes the gallery as a whole: where the album
//! folders live, the site title, the timezone album dates are interpreted in,
//! and the named size variants every image is rendered at. User files are
//! sparse and are layered over stock defaults before being validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! [gallery]
//! title = "Photos"
//! description = ""
//! source = ["."]            # Album roots, relative to this file
//! timezone = "UTC"          # "UTC", "Z" or a fixed offset like "+03:00"
//!
//! [sizes.thumb]             # One table per variant; the table name is the
//! width = 300               # variant name used in output paths
//! height = 300
//! crop = true
//! quality = 95              # 80-100
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [metadata]
//! extractor = "exif"        # "exif" (built in) or "exiftool" (external program)
//! memo_capacity = 64
//! ```
//!
//! ## Merging
//!
//! Tables merge key by key, except `[sizes]`: a user file that declares any
//! variant replaces the stock variant list entirely, so unwanted defaults do
//! not linger in the output.
//!
//! ## Validation
//!
//! Everything that could make a resize task fail for configuration reasons is
//! checked here, before any work is scheduled: quality bounds, zero
//! dimensions, an empty variant list, and an unparseable timezone.

use crate::imaging::{OptionError, ResizeOption};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default gallery config file name, also the descriptor file name.
pub const CONFIG_FILENAME: &str = "behappy.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Invalid size variant: {0}")]
    Size(#[from] OptionError),
}

/// Gallery configuration loaded from `behappy.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    pub gallery: GallerySection,
    /// Named size variants, keyed by variant name.
    pub sizes: BTreeMap<String, SizeConfig>,
    pub processing: ProcessingConfig,
    pub metadata: MetadataConfig,
    /// Directory relative source paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        let mut sizes = BTreeMap::new();
        sizes.insert(
            "thumb".to_string(),
            SizeConfig {
                width: 300,
                height: 300,
                crop: true,
                quality: default_quality(),
            },
        );
        sizes.insert(
            "small".to_string(),
            SizeConfig {
                width: 1280,
                height: 1280,
                crop: false,
                quality: default_quality(),
            },
        );
        sizes.insert(
            "big".to_string(),
            SizeConfig {
                width: 2560,
                height: 2560,
                crop: false,
                quality: default_quality(),
            },
        );
        Self {
            gallery: GallerySection::default(),
            sizes,
            processing: ProcessingConfig::default(),
            metadata: MetadataConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl GalleryConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gallery.source.is_empty() {
            return Err(ConfigError::Validation(
                "gallery.source must list at least one directory".into(),
            ));
        }
        if self.sizes.is_empty() {
            return Err(ConfigError::Validation(
                "at least one [sizes.<name>] variant is required".into(),
            ));
        }
        if self.sizes.contains_key(crate::media::VIDEO_DIR) {
            return Err(ConfigError::Validation(format!(
                "size variant name {:?} is reserved for copied videos",
                crate::media::VIDEO_DIR
            )));
        }
        self.timezone()?;
        self.resize_options()?;
        if self.metadata.memo_capacity == 0 {
            return Err(ConfigError::Validation(
                "metadata.memo_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The gallery timezone as a fixed UTC offset.
    pub fn timezone(&self) -> Result<FixedOffset, ConfigError> {
        parse_timezone(&self.gallery.timezone)
    }

    /// Build one [`ResizeOption`] per size variant, in variant-name order.
    ///
    /// Fails on the first variant with out-of-range quality or zero dimensions.
    pub fn resize_options(&self) -> Result<Vec<ResizeOption>, ConfigError> {
        self.sizes
            .iter()
            .map(|(name, size)| {
                ResizeOption::new(name, size.width, size.height, size.crop, size.quality)
                    .map_err(ConfigError::from)
            })
            .collect()
    }

    /// Album roots as absolute-or-base-relative paths.
    pub fn source_dirs(&self) -> Vec<PathBuf> {
        self.gallery
            .source
            .iter()
            .map(|s| self.base_dir.join(s))
            .collect()
    }
}

/// The `[gallery]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GallerySection {
    pub title: String,
    pub description: String,
    /// Album roots, scanned recursively for descriptors.
    pub source: Vec<String>,
    /// `"UTC"`, `"Z"`, or a fixed offset such as `"+03:00"`.
    pub timezone: String,
}

impl Default for GallerySection {
    fn default() -> Self {
        Self {
            title: "Photos".to_string(),
            description: String::new(),
            source: vec![".".to_string()],
            timezone: "UTC".to_string(),
        }
    }
}

/// One `[sizes.<name>]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizeConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub crop: bool,
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_quality() -> u8 {
    95
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel resize workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, never less than one
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Which metadata collaborator to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Built-in EXIF reader.
    #[default]
    Exif,
    /// The external `exiftool` program.
    Exiftool,
}

/// Metadata extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    pub extractor: ExtractorKind,
    /// Number of distinct extraction requests remembered for the process lifetime.
    pub memo_capacity: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorKind::default(),
            memo_capacity: 64,
        }
    }
}

/// Parse `"UTC"`, `"Z"`, `"+HH:MM"` or `"-HH:MM"` into a fixed offset.
pub fn parse_timezone(value: &str) -> Result<FixedOffset, ConfigError> {
    let value = value.trim();
    let invalid = || ConfigError::Validation(format!("gallery.timezone is invalid: {value:?}"));
    if value.eq_ignore_ascii_case("utc") || value == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }
    let (sign, rest) = match value.as_bytes().first() {
        Some(b'+') => (1, &value[1..]),
        Some(b'-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GalleryConfig::default()).expect("default config must serialize")
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

/// Layer a user config over the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<GalleryConfig, ConfigError> {
    let mut base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => {
            if let (toml::Value::Table(base_table), Some(_)) = (&mut base, ov.get("sizes")) {
                base_table.remove("sizes");
            }
            merge_toml(base, ov)
        }
        None => base,
    };
    let config: GalleryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the gallery config from `path`.
///
/// A missing file yields the validated stock defaults. Relative `source`
/// entries resolve against the directory containing `path`.
pub fn load_config(path: &Path) -> Result<GalleryConfig, ConfigError> {
    let overlay = if path.exists() {
        let content = fs::read_to_string(path)?;
        Some(toml::from_str::<toml::Value>(&content)?)
    } else {
        None
    };
    let mut config = resolve_config(overlay)?;
    config.base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(config)
}

/// Returns a fully-commented stock `behappy.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# BeHappy gallery configuration
# =============================
# All settings are optional. Values shown below are the defaults.
# Unknown keys cause an error.

[gallery]
title = "Photos"
description = ""
# Directories scanned recursively for album descriptors (behappy.toml,
# behappy.<name>.toml). Relative paths resolve against this file.
source = ["."]
# Timezone album dates are interpreted in: "UTC", "Z" or "+HH:MM".
timezone = "UTC"

# ---------------------------------------------------------------------------
# Size variants
# ---------------------------------------------------------------------------
# Every image is rendered once per variant into album/<id>/<variant>/.
# Declaring any [sizes.*] table replaces this whole list.
#
# crop = true  scales the short edge to max(width, height) and center-crops
#              to exactly width x height.
# crop = false fits the image inside width x height, keeping aspect ratio.
# quality must be between 80 and 100.

[sizes.big]
width = 2560
height = 2560
crop = false
quality = 95

[sizes.small]
width = 1280
height = 1280
crop = false
quality = 95

[sizes.thumb]
width = 300
height = 300
crop = true
quality = 95

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel resize workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Metadata
# ---------------------------------------------------------------------------
[metadata]
# "exif" reads EXIF with the built-in parser; "exiftool" shells out to
# exiftool, which also understands video containers.
extractor = "exif"
# Distinct extraction requests remembered while the build runs.
memo_capacity = 64
"##
}
