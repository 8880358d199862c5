//! Content-addressed image processing.
//!
//! Stage 3 of the build. Every source image produces two artifacts, a full
//! image and a thumbnail, under a name derived from its identity path:
//!
//! ```text
//! _galleries/2023-05-01_trip/beach.jpg
//!   → <dest>/gallery/2023/05/<sha256>.jpg      full image
//!   → <dest>/gallery/2023/05/<sha256>_t.jpg    thumbnail
//! ```
//!
//! The hash covers the site-relative source path, not the file content, so
//! renaming or moving an image gives it a new name while editing it in place
//! does not.
//!
//! ## Format policy
//!
//! `.jpg`, `.jpeg` and `.png` (any case) keep their extension. Everything
//! else is converted to PNG and the output name gets a `.png` extension.
//!
//! ## Incremental writes
//!
//! An artifact whose modification time (whole seconds) equals the source's is
//! left alone without decoding anything. Otherwise the stale file is removed,
//! the artifact is rendered and its mtime is set to the source's, which is
//! what makes the next build skip it. Access times are not touched.
//!
//! ## Parallel Processing
//!
//! Images are processed in parallel using [rayon](https://docs.rs/rayon). The
//! first failure stops the gallery and is returned to the caller.

use crate::config::GalleryConfig;
use crate::imaging::{
    BackendError, ImageBackend, OutputFormat, Quality, ResizeParams, ThumbnailParams,
};
use crate::types::{GalleryDirectoryEntry, GalleryImage};
use chrono::{Datelike, NaiveDateTime};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error for {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Image processing failed for {path}: {source}")]
    Imaging { path: PathBuf, source: BackendError },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ProcessError + '_ {
    move |source| ProcessError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Settings the pipeline needs, taken from [`GalleryConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    /// Output root segments, e.g. `["gallery"]`.
    pub root: Vec<String>,
    /// Bounding box for full images; `None` keeps the original size.
    pub image_size: Option<(u32, u32)>,
    pub thumbnail_size: (u32, u32),
    pub quality: Quality,
}

impl ProcessConfig {
    pub fn from_gallery_config(config: &GalleryConfig) -> Self {
        Self {
            root: config
                .path_segments()
                .into_iter()
                .map(str::to_string)
                .collect(),
            image_size: config.image_size.map(|s| (s.x, s.y)),
            thumbnail_size: (config.thumbnail_size.x, config.thumbnail_size.y),
            quality: Quality::new(config.processing.quality),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::from_gallery_config(&GalleryConfig::default())
    }
}

/// Which artifact of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Full,
    Thumbnail,
}

impl Variant {
    fn suffix(self) -> &'static str {
        match self {
            Variant::Full => "",
            Variant::Thumbnail => "_t",
        }
    }
}

/// SHA-256 of the identity path, as lowercase hex.
pub fn source_hash(source_path: &str) -> String {
    format!("{:x}", Sha256::digest(source_path.as_bytes()))
}

/// Output file name and encoder for one artifact of `source_path`.
pub fn output_name(source_path: &str, variant: Variant) -> (String, OutputFormat) {
    let file_name = source_path.rsplit('/').next().unwrap_or(source_path);
    let ext = match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[dot + 1..],
        _ => "",
    };
    let (ext, format) = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => (ext, OutputFormat::Jpeg),
        "png" => (ext, OutputFormat::Png),
        _ => ("png", OutputFormat::Png),
    };
    let name = format!("{}{}.{}", source_hash(source_path), variant.suffix(), ext);
    (name, format)
}

/// Output directory segments for a gallery dated `date`: `<root>/<year>/<MM>`.
pub fn image_dir(config: &ProcessConfig, date: NaiveDateTime) -> Vec<String> {
    let mut segments = config.root.clone();
    segments.push(date.year().to_string());
    segments.push(format!("{:02}", date.month()));
    segments
}

/// One planned artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryFile {
    pub source: PathBuf,
    pub variant: Variant,
    pub format: OutputFormat,
    /// Directory segments under the destination root.
    pub dir: Vec<String>,
    pub file_name: String,
}

impl GalleryFile {
    pub fn new(entry: &GalleryDirectoryEntry, variant: Variant, dir: Vec<String>) -> Self {
        let (file_name, format) = output_name(&entry.source_path, variant);
        Self {
            source: entry.path.clone(),
            variant,
            format,
            dir,
            file_name,
        }
    }

    /// Web-root-relative URL, e.g. `/gallery/2023/05/<hash>.jpg`.
    pub fn url(&self) -> String {
        format!("/{}/{}", self.dir.join("/"), self.file_name)
    }

    pub fn destination(&self, dest: &Path) -> PathBuf {
        self.dir
            .iter()
            .fold(dest.to_path_buf(), |path, segment| path.join(segment))
            .join(&self.file_name)
    }

    /// Whether the artifact exists with the source's mtime (whole seconds).
    pub fn is_up_to_date(&self, dest: &Path) -> Result<bool, ProcessError> {
        let destination = self.destination(dest);
        let Ok(target) = fs::metadata(&destination) else {
            return Ok(false);
        };
        let source_mtime = fs::metadata(&self.source)
            .and_then(|m| m.modified())
            .map_err(io_error(&self.source))?;
        let target_mtime = target.modified().map_err(io_error(&destination))?;
        Ok(secs(source_mtime) == secs(target_mtime))
    }

    /// Render the artifact unless it is up to date.
    pub fn write(
        &self,
        dest: &Path,
        backend: &impl ImageBackend,
        config: &ProcessConfig,
        stats: &WriteStats,
    ) -> Result<(), ProcessError> {
        if self.is_up_to_date(dest)? {
            stats.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let destination = self.destination(dest);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        if destination.exists() {
            fs::remove_file(&destination).map_err(io_error(&destination))?;
        }

        tracing::debug!("Writing {}", destination.display());
        let rendered = match self.variant {
            Variant::Full => backend.resize(&ResizeParams {
                source: self.source.clone(),
                output: destination.clone(),
                bounds: config.image_size,
                format: self.format,
                quality: config.quality,
            }),
            Variant::Thumbnail => backend.thumbnail(&ThumbnailParams {
                source: self.source.clone(),
                output: destination.clone(),
                width: config.thumbnail_size.0,
                height: config.thumbnail_size.1,
                format: self.format,
                quality: config.quality,
            }),
        };
        rendered.map_err(|source| ProcessError::Imaging {
            path: self.source.clone(),
            source,
        })?;

        copy_mtime(&self.source, &destination)?;
        stats.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Set `target`'s mtime to `source`'s, leaving its atime alone.
fn copy_mtime(source: &Path, target: &Path) -> Result<(), ProcessError> {
    let modified = fs::metadata(source)
        .and_then(|m| m.modified())
        .map_err(io_error(source))?;
    fs::File::options()
        .write(true)
        .open(target)
        .and_then(|file| file.set_modified(modified))
        .map_err(io_error(target))
}

/// Both artifacts of one source image.
fn plan(entry: &GalleryDirectoryEntry, dir: &[String]) -> (GalleryFile, GalleryFile) {
    (
        GalleryFile::new(entry, Variant::Full, dir.to_vec()),
        GalleryFile::new(entry, Variant::Thumbnail, dir.to_vec()),
    )
}

fn gallery_image(entry: &GalleryDirectoryEntry, full: &GalleryFile, thumb: &GalleryFile) -> GalleryImage {
    GalleryImage {
        output_path: full.url(),
        thumbnail_path: thumb.url(),
        capture_time: entry.capture_time,
        source_path: entry.source_path.clone(),
    }
}

/// Compute every image's output URLs without touching the filesystem.
pub fn plan_gallery_images(
    entries: &[GalleryDirectoryEntry],
    date: NaiveDateTime,
    config: &ProcessConfig,
) -> Vec<GalleryImage> {
    let dir = image_dir(config, date);
    entries
        .iter()
        .map(|entry| {
            let (full, thumb) = plan(entry, &dir);
            gallery_image(entry, &full, &thumb)
        })
        .collect()
}

/// Plan every image and confirm the backend can read it, without writing.
pub fn check_gallery_images(
    entries: &[GalleryDirectoryEntry],
    date: NaiveDateTime,
    config: &ProcessConfig,
    backend: &impl ImageBackend,
) -> Result<Vec<GalleryImage>, ProcessError> {
    entries.par_iter().try_for_each(|entry| {
        backend
            .identify(&entry.path)
            .map(|dims| {
                tracing::trace!(
                    "{}: {}x{}",
                    entry.source_path,
                    dims.width,
                    dims.height
                )
            })
            .map_err(|source| ProcessError::Imaging {
                path: entry.path.clone(),
                source,
            })
    })?;
    Ok(plan_gallery_images(entries, date, config))
}

/// Write both artifacts of every image in a gallery dated `date`.
pub fn process_gallery_images(
    entries: &[GalleryDirectoryEntry],
    date: NaiveDateTime,
    config: &ProcessConfig,
    dest: &Path,
    backend: &impl ImageBackend,
    stats: &WriteStats,
) -> Result<Vec<GalleryImage>, ProcessError> {
    let dir = image_dir(config, date);
    entries
        .par_iter()
        .map(|entry| {
            let (full, thumb) = plan(entry, &dir);
            full.write(dest, backend, config, stats)?;
            thumb.write(dest, backend, config, stats)?;
            Ok(gallery_image(entry, &full, &thumb))
        })
        .collect()
}

/// Artifact counts for a build.
#[derive(Debug, Default)]
pub struct WriteStats {
    pub written: AtomicU32,
    pub skipped: AtomicU32,
}

impl WriteStats {
    pub fn written(&self) -> u32 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u32 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl fmt::Display for WriteStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped() > 0 {
            write!(
                f,
                "{} written, {} up to date ({} total)",
                self.written(),
                self.skipped(),
                self.written() + self.skipped()
            )
        } else {
            write!(f, "{} written", self.written())
        }
    }
}
