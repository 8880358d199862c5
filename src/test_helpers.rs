//! Shared test utilities.
//!
//! Provides date shorthands, synthetic image writers (including JPEGs with a
//! hand-built EXIF segment), model fixtures, and a [`SiteBuilder`] that lays
//! out a throwaway site source tree.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = SiteBuilder::new()
//!     .image("2023-05-01_trip", "beach.jpg")
//!     .file("config.toml", "[gallery]\npath = \"photos\"\n")
//!     .build();
//! ```

use crate::scan::GALLERIES_DIR;
use crate::types::{Gallery, GalleryImage};
use chrono::{NaiveDate, NaiveDateTime};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

// =========================================================================
// Dates and files
// =========================================================================

pub fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, mi, s))
        .unwrap()
}

/// Set a file's mtime to `secs` since the epoch.
pub fn set_mtime(path: &Path, secs: u64) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
}

pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    gradient(width, height).save(path).unwrap();
}

/// PNG with a transparent left half.
pub fn write_png(path: &Path, width: u32, height: u32) {
    RgbaImage::from_fn(width, height, |x, _| {
        Rgba([200, 100, 50, if x < width / 2 { 0 } else { 255 }])
    })
    .save(path)
    .unwrap();
}

/// Encode a JPEG and splice an EXIF APP1 segment in after SOI.
///
/// `date` is written as `DateTimeOriginal` (`YYYY:MM:DD HH:MM:SS`),
/// `orientation` as the IFD0 Orientation tag.
pub fn jpeg_with_exif(
    width: u32,
    height: u32,
    date: Option<&str>,
    orientation: Option<u16>,
) -> Vec<u8> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, 90)
        .encode_image(&gradient(width, height))
        .unwrap();

    let tiff = exif_tiff(date, orientation);
    let mut out = jpeg[..2].to_vec();
    out.extend([0xFF, 0xE1]);
    out.extend(((2 + 6 + tiff.len()) as u16).to_be_bytes());
    out.extend(b"Exif\0\0");
    out.extend(tiff);
    out.extend(&jpeg[2..]);
    out
}

/// Big-endian TIFF structure: IFD0 (Orientation, Exif pointer) and an Exif
/// IFD holding DateTimeOriginal.
fn exif_tiff(date: Option<&str>, orientation: Option<u16>) -> Vec<u8> {
    fn entry(out: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: [u8; 4]) {
        out.extend(tag.to_be_bytes());
        out.extend(kind.to_be_bytes());
        out.extend(count.to_be_bytes());
        out.extend(value);
    }
    const SHORT: u16 = 3;
    const LONG: u16 = 4;
    const ASCII: u16 = 2;

    let ifd0_entries = orientation.is_some() as u16 + date.is_some() as u16;
    let exif_ifd = 8 + 2 + 12 * ifd0_entries as u32 + 4;
    let date_offset = exif_ifd + 2 + 12 + 4;

    let mut out = b"MM\0\x2A".to_vec();
    out.extend(8u32.to_be_bytes());
    out.extend(ifd0_entries.to_be_bytes());
    if let Some(o) = orientation {
        let [hi, lo] = o.to_be_bytes();
        entry(&mut out, 0x0112, SHORT, 1, [hi, lo, 0, 0]);
    }
    if date.is_some() {
        entry(&mut out, 0x8769, LONG, 1, exif_ifd.to_be_bytes());
    }
    out.extend(0u32.to_be_bytes());

    if let Some(date) = date {
        out.extend(1u16.to_be_bytes());
        entry(
            &mut out,
            0x9003,
            ASCII,
            date.len() as u32 + 1,
            date_offset.to_be_bytes(),
        );
        out.extend(0u32.to_be_bytes());
        out.extend(date.as_bytes());
        out.push(0);
    }
    out
}

// =========================================================================
// Model fixtures
// =========================================================================

/// A processed image whose source file stem is `stem`.
pub fn image(stem: &str, capture_time: Option<NaiveDateTime>) -> GalleryImage {
    GalleryImage {
        output_path: format!("/gallery/{stem}.jpg"),
        thumbnail_path: format!("/gallery/{stem}_t.jpg"),
        capture_time,
        source_path: format!("{GALLERIES_DIR}/test/{stem}.jpg"),
    }
}

/// A one-image gallery named after its id.
pub fn gallery(id: &str, date: NaiveDateTime) -> Gallery {
    let img = image(&format!("{id}-cover"), Some(date));
    Gallery {
        id: id.to_string(),
        name: id.to_string(),
        images: vec![img.clone()],
        highlight_image: img,
        date,
        extra: BTreeMap::new(),
    }
}

// =========================================================================
// Site trees
// =========================================================================

/// Builds a site source tree in a temp directory.
pub struct SiteBuilder {
    dir: TempDir,
}

impl SiteBuilder {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Add a placeholder image at `_galleries/<gallery>/<file>`.
    pub fn image(self, gallery: &str, file: &str) -> Self {
        let path = self.dir.path().join(GALLERIES_DIR).join(gallery).join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"placeholder").unwrap();
        self
    }

    /// Add a file at a site-relative path.
    pub fn file(self, rel: &str, content: &str) -> Self {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        self
    }

    pub fn build(self) -> TempDir {
        self.dir
    }
}
