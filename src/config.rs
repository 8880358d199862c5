//! Site configuration module.
//!
//! Gallery settings live in the `[gallery]` table of `config.toml` at the site
//! source root. Everything is optional: stock defaults are serialized to a TOML
//! value and the user's table is merged on top, so a config file only needs the
//! keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! [gallery]
//! path = "gallery"              # Output root segment (URLs and files)
//! generate_root_index = false   # Extra index at /<path>/ for the latest year
//! title_prefix = "Photos"
//! title_seperator = "|"
//!
//! # Omit to keep full images at their original size.
//! # image_size = { x = 2048, y = 2048 }
//!
//! [gallery.thumbnail_size]
//! x = 512
//! y = 512
//!
//! [gallery.processing]
//! # max_processes = 4           # Max parallel workers (omit for auto)
//! quality = 90                  # JPEG encoding quality (1-100)
//! ```
//!
//! A missing `config.toml`, or one without a `[gallery]` table, is not an
//! error: the caller logs a warning and the defaults apply. A file that exists
//! but is not valid TOML, or carries unknown keys under `[gallery]`, is fatal.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the site configuration file in the source root.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Table within the site config that holds gallery settings.
const GALLERY_TABLE: &str = "gallery";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// A pixel box, written `{ x = 512, y = 512 }` in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Size {
    pub x: u32,
    pub y: u32,
}

impl Size {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// Gallery configuration, the `[gallery]` table of `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Output root segment, may contain `/` (e.g. `"photos/archive"`).
    pub path: String,
    /// Emit an additional index page at `/<path>/` for the most recent year.
    pub generate_root_index: bool,
    /// Bounding box for full images. `None` keeps the original size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<Size>,
    /// Exact thumbnail size (crop-to-fill).
    pub thumbnail_size: Size,
    pub title_prefix: String,
    /// Joins title parts. The spelling is part of the public config surface.
    pub title_seperator: String,
    pub processing: ProcessingConfig,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            path: "gallery".to_string(),
            generate_root_index: false,
            image_size: None,
            thumbnail_size: Size::new(512, 512),
            title_prefix: "Photos".to_string(),
            title_seperator: "|".to_string(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl GalleryConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnail_size.x == 0 || self.thumbnail_size.y == 0 {
            return Err(ConfigError::Validation(
                "gallery.thumbnail_size values must be non-zero".into(),
            ));
        }
        if let Some(size) = self.image_size
            && (size.x == 0 || size.y == 0)
        {
            return Err(ConfigError::Validation(
                "gallery.image_size values must be non-zero".into(),
            ));
        }
        if self.processing.quality == 0 || self.processing.quality > 100 {
            return Err(ConfigError::Validation(
                "gallery.processing.quality must be 1-100".into(),
            ));
        }
        Ok(())
    }

    /// Output root split into URL/path segments, empty segments dropped.
    pub fn path_segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
    /// JPEG encoding quality for full images and thumbnails.
    pub quality: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            quality: 90,
        }
    }
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

/// Where the effective configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// `config.toml` with a `[gallery]` table.
    File,
    /// No `config.toml` in the source root.
    MissingFile,
    /// `config.toml` exists but has no `[gallery]` table.
    MissingTable,
}

/// Loaded configuration plus a note on where it came from, so the caller can
/// warn when defaults were used.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: GalleryConfig,
    pub source: ConfigSource,
}

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(GalleryConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
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

/// Merge an optional `[gallery]` table onto the stock defaults, then
/// deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<GalleryConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GalleryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load gallery config from `config.toml` in the site source root.
pub fn load_config(root: &Path) -> Result<LoadedConfig, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.is_file() {
        return Ok(LoadedConfig {
            config: resolve_config(None)?,
            source: ConfigSource::MissingFile,
        });
    }

    let content = fs::read_to_string(&config_path)?;
    let mut site: toml::Table = toml::from_str(&content)?;
    let (overlay, source) = match site.remove(GALLERY_TABLE) {
        Some(table) => (Some(table), ConfigSource::File),
        None => (None, ConfigSource::MissingTable),
    };

    Ok(LoadedConfig {
        config: resolve_config(overlay)?,
        source,
    })
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Gallery Configuration
# =====================
# All settings are optional. Values shown below are the defaults.
# Unknown keys under [gallery] cause an error.

[gallery]
# Output root segment. Images land in <dest>/<path>/<year>/<month>/ and
# gallery pages are addressed as /<path>/<year>/<month>/<id>.html.
path = "gallery"

# Also emit an index page at /<path>/ listing the most recent year.
generate_root_index = false

# Page titles are joined as "<title_prefix> <sep> <year> <sep> <name>".
title_prefix = "Photos"
title_seperator = "|"

# Bounding box for full-size images. Images are only ever shrunk to fit,
# never enlarged. Leave commented out to keep originals at full size.
# image_size = { x = 2048, y = 2048 }

# Thumbnails are cropped to fill exactly this size (center gravity).
[gallery.thumbnail_size]
x = 512
y = 512

[gallery.processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# JPEG encoding quality (1 = worst, 100 = best).
quality = 90
"##
}
