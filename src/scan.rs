//! Gallery discovery and EXIF loading.
//!
//! Stage 1 of the build. Walks `<source>/_galleries/` and turns every
//! directory that directly contains files into a [`GalleryDir`]:
//!
//! ```text
//! site/
//! ├── config.toml
//! └── _galleries/
//!     ├── 2023-05-01_summer-trip/      # gallery, dated by its name
//!     │   ├── _metadata.toml           # optional overrides (not an image)
//!     │   ├── hl_beach.jpg             # highlight image
//!     │   └── dunes.heic
//!     ├── travel/                      # no files of its own: not a gallery
//!     │   └── 2022_09_14-lisbon/       # nested gallery
//!     │       └── tram.jpg
//!     └── .drafts/                     # hidden: skipped with its subtree
//! ```
//!
//! Every other file in a gallery directory is treated as an image, except
//! `.ds_store`, `thumbs.db` (any case), hidden files and the `_metadata.*`
//! file. Files and galleries come out sorted by path so builds are
//! reproducible.

use crate::exif_cache::{ExifCache, ExifData};
use crate::imaging::{BackendError, ImageBackend};
use crate::logging::LogOnce;
use crate::metadata::METADATA_STEM;
use crate::types::GalleryDirectoryEntry;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Directory under the site source that holds the galleries.
pub const GALLERIES_DIR: &str = "_galleries";

/// File names never treated as images (compared lowercased).
const IGNORED_FILES: &[&str] = &[".ds_store", "thumbs.db"];

const LOADING_EXIF_MESSAGE: &str = "Loading EXIF data. This may take some time on the first run";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error scanning {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Failed to walk galleries: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Failed to read EXIF data from {path}: {source}")]
    Exif { path: PathBuf, source: BackendError },
}

/// A directory that holds a gallery's images.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryDir {
    /// Filesystem path of the directory.
    pub path: PathBuf,
    /// Path relative to `_galleries`, `/`-separated (`travel/2022_09_14-lisbon`).
    pub rel_dir: String,
    /// Last path component; input to name parsing.
    pub dir_name: String,
    /// Image files, sorted.
    pub files: Vec<PathBuf>,
}

impl GalleryDir {
    /// Site-relative label, e.g. `_galleries/2023-05-01_trip`.
    pub fn label(&self) -> String {
        format!("{GALLERIES_DIR}/{}", self.rel_dir)
    }

    /// Site-relative identity path of one of this gallery's files.
    pub fn source_path(&self, file: &Path) -> String {
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        format!("{}/{}", self.label(), file_name)
    }
}

/// Location of the galleries directory for a site source root.
pub fn galleries_root(source: &Path) -> PathBuf {
    source.join(GALLERIES_DIR)
}

/// Find all galleries under `<source>/_galleries`.
///
/// Returns `Ok(None)` when the galleries directory does not exist.
pub fn discover_galleries(source: &Path) -> Result<Option<Vec<GalleryDir>>, ScanError> {
    let root = galleries_root(source);
    if !root.is_dir() {
        return Ok(None);
    }

    let mut galleries = Vec::new();
    for entry in WalkDir::new(&root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let files = collect_image_files(entry.path())?;
        if files.is_empty() {
            tracing::debug!("Skipping {}: no image files", entry.path().display());
            continue;
        }
        let rel_dir = entry
            .path()
            .strip_prefix(&root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        galleries.push(GalleryDir {
            path: entry.path().to_path_buf(),
            dir_name: entry.file_name().to_string_lossy().to_string(),
            rel_dir,
            files,
        });
    }

    Ok(Some(galleries))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Direct children of `dir` that are image files.
fn collect_image_files(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let io_err = |source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if path.is_file() && !is_ignored(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_ignored(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    // Any dotfile is skipped, not only `.DS_Store`: `._photo.jpg` AppleDouble
    // files and editor swap files sit next to images.
    name.starts_with('.') || IGNORED_FILES.contains(&name.as_str()) || stem == METADATA_STEM
}

/// Modification time in whole seconds since the epoch.
pub fn mtime_secs(path: &Path) -> io::Result<u64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0))
}

/// Read every image's capture time, through the cache, in parallel.
///
/// The first failure aborts the gallery.
pub fn load_entries(
    gallery: &GalleryDir,
    backend: &impl ImageBackend,
    cache: &ExifCache,
    log: &LogOnce,
) -> Result<Vec<GalleryDirectoryEntry>, ScanError> {
    let keyed = gallery
        .files
        .iter()
        .map(|file| {
            let mtime = mtime_secs(file).map_err(|source| ScanError::Io {
                path: file.clone(),
                source,
            })?;
            Ok((file, gallery.source_path(file), mtime))
        })
        .collect::<Result<Vec<_>, ScanError>>()?;

    if cache.needs_reads(keyed.iter().map(|(_, key, mtime)| (key.as_str(), *mtime))) {
        log.info(LOADING_EXIF_MESSAGE);
    }

    keyed
        .into_par_iter()
        .map(|(file, source_path, mtime)| {
            let exif = cache.get_or_compute(&source_path, mtime, || {
                backend.read_metadata(file).map(|meta| ExifData {
                    capture_time: meta.capture_time,
                })
            });
            let exif = exif.map_err(|source| ScanError::Exif {
                path: file.clone(),
                source,
            })?;
            Ok(GalleryDirectoryEntry {
                path: file.clone(),
                source_path,
                capture_time: exif.capture_time,
            })
        })
        .collect()
}
