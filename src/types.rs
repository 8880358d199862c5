//! Shared types handed from the pipeline to the rendering layer.
//!
//! Serialized field names are the template contract: `galleries`,
//! `gallery_years`, and per gallery `id`, `name`, `images`,
//! `highlight_image`, `datetime` (`{year, month, day}`), with per image
//! `path`, `thumbnail_path`, `creation_datetime`, `original_path`.

use chrono::{Datelike, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A source image before its outputs are known.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryDirectoryEntry {
    /// Absolute (or caller-rooted) path used to read the file.
    pub path: PathBuf,
    /// Site-relative identity path, `/`-separated, e.g. `_galleries/2023-05-01_trip/a.jpg`.
    pub source_path: String,
    pub capture_time: Option<NaiveDateTime>,
}

/// A processed image: both artifacts exist (or were already up to date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryImage {
    /// Web-root-relative path of the full image.
    #[serde(rename = "path")]
    pub output_path: String,
    /// Web-root-relative path of the thumbnail.
    pub thumbnail_path: String,
    #[serde(rename = "creation_datetime")]
    pub capture_time: Option<NaiveDateTime>,
    #[serde(rename = "original_path")]
    pub source_path: String,
}

impl GalleryImage {
    /// File stem of the source image (`hl_sunset` for `.../hl_sunset.jpg`).
    pub fn source_stem(&self) -> &str {
        let file_name = self
            .source_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.source_path);
        match file_name.rfind('.') {
            Some(0) | None => file_name,
            Some(dot) => &file_name[..dot],
        }
    }
}

/// A fully assembled gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gallery {
    pub id: String,
    pub name: String,
    /// Sorted by capture time, newest first, undated images last.
    pub images: Vec<GalleryImage>,
    pub highlight_image: GalleryImage,
    #[serde(rename = "datetime", serialize_with = "serialize_date_parts")]
    pub date: NaiveDateTime,
    /// Extra metadata-file keys, passed through to templates.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Gallery {
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }
}

#[derive(Serialize)]
struct DateParts {
    year: i32,
    month: u32,
    day: u32,
}

fn serialize_date_parts<S: Serializer>(date: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    DateParts {
        year: date.year(),
        month: date.month(),
        day: date.day(),
    }
    .serialize(s)
}

/// Galleries of one calendar year, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearGroup {
    pub year: i32,
    pub galleries: Vec<Gallery>,
}

/// The in-memory model handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteModel {
    /// All galleries, newest first.
    pub galleries: Vec<Gallery>,
    /// Years with at least one gallery, ascending.
    pub gallery_years: Vec<i32>,
    /// Same galleries grouped by year, newest year first.
    #[serde(skip)]
    pub by_year: Vec<YearGroup>,
}
