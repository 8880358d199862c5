//! Per-gallery metadata files.
//!
//! A gallery directory may hold one `_metadata.<ext>` file. Formats are tried
//! in priority order and the first existing file wins:
//!
//! 1. `_metadata.toml`
//! 2. `_metadata.json`
//!
//! The file is a flat table. Recognized keys:
//!
//! - `datetime`: the gallery date; overrides the directory prefix and EXIF.
//! - `id`, `name`: override the values derived from the directory name.
//!
//! Every other key is passed through verbatim to the rendering layer, except
//! `images` and `highlight_image`: those are computed by the build and a
//! metadata value for them is dropped with a warning.
//!
//! ## `datetime` formats
//!
//! Accepted, tried in this order:
//!
//! | Format | Example |
//! |---|---|
//! | RFC 3339 | `2023-05-01T18:30:00+02:00` (wall-clock time in its own offset) |
//! | date + time | `2023-05-01 18:30:00` or `2023-05-01T18:30:00` |
//! | date + minutes | `2023-05-01 18:30` |
//! | date | `2023-05-01` |
//!
//! In TOML the value may also be a native date or datetime literal.
//! Anything else is a fatal error: a typo in a date should never silently fall
//! back to EXIF.

use crate::logging::LogOnce;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Metadata file stem. Files with this stem are never treated as images.
pub const METADATA_STEM: &str = "_metadata";

/// Gallery fields the build computes; metadata can't replace them.
const RESERVED_KEYS: &[&str] = &["images", "highlight_image"];

/// Supported extensions, highest priority first.
const FORMATS: &[(&str, MetadataFormat)] = &[
    ("toml", MetadataFormat::Toml),
    ("json", MetadataFormat::Json),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    Toml,
    Json,
}

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed metadata file {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Malformed metadata file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Metadata file {path} must contain a table of keys at the top level")]
    NotATable { path: PathBuf },
    #[error("Invalid datetime {value:?} in {path}: expected YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or RFC 3339")]
    InvalidDatetime { path: PathBuf, value: String },
    #[error("Metadata key '{key}' in {path} must be a string")]
    NotAString { path: PathBuf, key: String },
}

/// Raw key/value content of a metadata file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMetadata {
    /// The file the values came from.
    pub path: PathBuf,
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// Typed overrides extracted from [`RawMetadata`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataOverrides {
    pub id: Option<String>,
    pub name: Option<String>,
    pub datetime: Option<NaiveDateTime>,
    /// Everything else, verbatim.
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Find the metadata file for a gallery directory, honoring format priority.
pub fn find_metadata_file(dir: &Path) -> Option<(PathBuf, MetadataFormat)> {
    FORMATS.iter().find_map(|(ext, format)| {
        let path = dir.join(format!("{METADATA_STEM}.{ext}"));
        path.is_file().then_some((path, *format))
    })
}

/// Load the gallery's metadata file, if any.
///
/// Returns `Ok(None)` when the directory has no metadata file.
pub fn load_metadata_from_dir(dir: &Path) -> Result<Option<RawMetadata>, MetadataError> {
    let Some((path, format)) = find_metadata_file(dir) else {
        return Ok(None);
    };

    let content = fs::read_to_string(&path).map_err(|source| MetadataError::Io {
        path: path.clone(),
        source,
    })?;

    let fields: BTreeMap<String, serde_json::Value> = match format {
        MetadataFormat::Toml => {
            let table: toml::Table =
                toml::from_str(&content).map_err(|source| MetadataError::Toml {
                    path: path.clone(),
                    source,
                })?;
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect()
        }
        MetadataFormat::Json => {
            let value: serde_json::Value =
                serde_json::from_str(&content).map_err(|source| MetadataError::Json {
                    path: path.clone(),
                    source,
                })?;
            match value {
                serde_json::Value::Object(map) => map.into_iter().collect(),
                _ => return Err(MetadataError::NotATable { path }),
            }
        }
    };

    Ok(Some(RawMetadata { path, fields }))
}

/// Convert a TOML value to JSON. Dates become their TOML text form, which
/// [`parse_datetime`] accepts.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => i.into(),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        toml::Value::Boolean(b) => b.into(),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(items) => items.into_iter().map(toml_to_json).collect(),
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

impl RawMetadata {
    /// Split the raw fields into typed overrides.
    pub fn into_overrides(self, log: &LogOnce) -> Result<MetadataOverrides, MetadataError> {
        let path = self.path;
        let mut overrides = MetadataOverrides::default();

        for (key, value) in self.fields {
            match key.as_str() {
                "datetime" => {
                    let text = match &value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let parsed = parse_datetime(&text).ok_or_else(|| {
                        MetadataError::InvalidDatetime {
                            path: path.clone(),
                            value: text.clone(),
                        }
                    })?;
                    overrides.datetime = Some(parsed);
                }
                "id" | "name" => {
                    let serde_json::Value::String(s) = value else {
                        return Err(MetadataError::NotAString { path, key });
                    };
                    if key == "id" {
                        overrides.id = Some(s);
                    } else {
                        overrides.name = Some(s);
                    }
                }
                reserved if RESERVED_KEYS.contains(&reserved) => {
                    log.warn(&format!(
                        "Ignoring '{key}' in {}: this field is computed from the gallery's images",
                        path.display()
                    ));
                }
                _ => {
                    overrides.extra.insert(key, value);
                }
            }
        }

        Ok(overrides)
    }
}

/// Parse a `datetime` value in one of the documented formats.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse an EXIF `DateTimeOriginal` value (`2023:05:01 18:30:00`).
pub fn parse_exif_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), "%Y:%m:%d %H:%M:%S").ok()
}
