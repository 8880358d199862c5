//! Build orchestration.
//!
//! Runs the stages in order for one site:
//!
//! ```text
//! config.toml ──► load_config
//! _galleries/ ──► scan ──► metadata + EXIF ──► resolve ──► process ──► aggregate ──► pages
//! ```
//!
//! Galleries are handled one after another; the images inside a gallery are
//! handled in parallel. Any error aborts the whole build, there is no partial
//! output model.
//!
//! Two situations only warn: a missing config (defaults apply) and a missing
//! `_galleries` directory (nothing to build, `Ok(None)`).

use crate::aggregate::{assemble_gallery, build_site_model};
use crate::config::{self, CONFIG_FILENAME, ConfigError, ConfigSource, GalleryConfig};
use crate::exif_cache::{ExifCache, ExifCacheStats};
use crate::imaging::ImageBackend;
use crate::logging::LogOnce;
use crate::metadata::{MetadataError, load_metadata_from_dir};
use crate::pages::{Page, build_pages};
use crate::process::{
    ProcessConfig, ProcessError, WriteStats, check_gallery_images, process_gallery_images,
};
use crate::resolve::{IdentityBuilder, ResolveError};
use crate::scan::{self, GalleryDir, ScanError};
use crate::types::{Gallery, SiteModel};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
    #[error("{0}")]
    Resolve(#[from] ResolveError),
    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What a run does with images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Write full images and thumbnails.
    Build,
    /// Resolve everything and verify images are readable, write nothing.
    Check,
}

/// Where a build reads from and writes to.
#[derive(Debug, Clone, Copy)]
pub struct BuildPaths<'a> {
    /// Site source root (holds `config.toml` and `_galleries/`).
    pub source: &'a Path,
    /// Site destination root.
    pub dest: &'a Path,
}

/// Everything a successful run produced.
#[derive(Debug)]
pub struct BuildOutput {
    pub config: GalleryConfig,
    pub model: SiteModel,
    pub pages: Vec<Page>,
    pub exif_stats: ExifCacheStats,
    pub write_stats: WriteStats,
}

/// Load the gallery config, warning once when defaults are used.
pub fn load_config(source: &Path, log: &LogOnce) -> Result<GalleryConfig, ConfigError> {
    let loaded = config::load_config(source)?;
    match loaded.source {
        ConfigSource::File => {}
        ConfigSource::MissingFile => log.warn(&format!(
            "No configuration ({CONFIG_FILENAME}) found, gallery defaults will be used"
        )),
        ConfigSource::MissingTable => log.warn(&format!(
            "No [gallery] table found in {CONFIG_FILENAME}, gallery defaults will be used"
        )),
    }
    Ok(loaded.config)
}

/// Run the pipeline for the site at `paths.source` with a config already
/// loaded by [`load_config`].
///
/// Returns `Ok(None)` when the site has no `_galleries` directory.
pub fn generate(
    paths: BuildPaths<'_>,
    config: &GalleryConfig,
    mode: Mode,
    backend: &impl ImageBackend,
    cache: &ExifCache,
    log: &LogOnce,
) -> Result<Option<BuildOutput>, GenerateError> {
    let Some(dirs) = scan::discover_galleries(paths.source)? else {
        log.warn(&format!(
            "No directory found at {}, skipping gallery generation",
            scan::galleries_root(paths.source).display()
        ));
        return Ok(None);
    };

    let process_config = ProcessConfig::from_gallery_config(config);
    tracing::debug!("Processing {}", processing_extents(config));
    let write_stats = WriteStats::default();
    let mut galleries = Vec::with_capacity(dirs.len());
    for dir in &dirs {
        if let Some(gallery) =
            build_gallery(dir, paths.dest, mode, &process_config, backend, cache, log, &write_stats)?
        {
            galleries.push(gallery);
        }
    }

    let model = build_site_model(galleries);
    let pages = build_pages(config, &model)?;
    tracing::info!(
        "{} galleries across {} years",
        model.galleries.len(),
        model.gallery_years.len()
    );

    Ok(Some(BuildOutput {
        config: config.clone(),
        model,
        pages,
        exif_stats: cache.stats(),
        write_stats,
    }))
}

#[allow(clippy::too_many_arguments)]
/// Target sizes for the debug log, e.g. `images within 100x100, thumbnails 32x24`.
fn processing_extents(config: &GalleryConfig) -> String {
    let images = match config.image_size {
        Some(size) => format!("within {size}"),
        None => "at original size".to_string(),
    };
    format!("images {images}, thumbnails {}", config.thumbnail_size)
}

fn build_gallery(
    dir: &GalleryDir,
    dest: &Path,
    mode: Mode,
    config: &ProcessConfig,
    backend: &impl ImageBackend,
    cache: &ExifCache,
    log: &LogOnce,
    stats: &WriteStats,
) -> Result<Option<Gallery>, GenerateError> {
    let label = dir.label();
    let entries = scan::load_entries(dir, backend, cache, log)?;
    let overrides = load_metadata_from_dir(&dir.path)?
        .map(|raw| raw.into_overrides(log))
        .transpose()?;

    let identity = IdentityBuilder::from_dir_name(&label, &dir.dir_name)?
        .with_capture_times(entries.iter().map(|e| e.capture_time))
        .with_metadata(overrides)
        .build()?;

    let images = match mode {
        Mode::Build => process_gallery_images(&entries, identity.date, config, dest, backend, stats)?,
        Mode::Check => check_gallery_images(&entries, identity.date, config, backend)?,
    };
    tracing::debug!("{label}: {} images, dated {}", images.len(), identity.date.date());

    Ok(assemble_gallery(identity, images))
}
