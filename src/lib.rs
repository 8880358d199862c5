//! # Dated Gallery
//!
//! An incremental photo gallery builder for static sites. Each directory under
//! `_galleries/` becomes a dated gallery; every image gets a resized copy and
//! a thumbnail under a content-addressed name, plus enough structured data for
//! a template engine to render gallery and year index pages.
//!
//! # Architecture: Stage Pipeline
//!
//! ```text
//! 1. Scan       _galleries/   →  GalleryDir + capture times (EXIF, cached)
//! 2. Resolve    dir name, EXIF, _metadata  →  id, name, date
//! 3. Process    source images  →  <dest>/<path>/<year>/<MM>/<sha256>[_t].<ext>
//! 4. Aggregate  galleries  →  SiteModel (sorted, grouped by year)
//! 5. Pages      SiteModel  →  page descriptors (gallery, year index, root index)
//! ```
//!
//! Rendering HTML is left to the host site; the crate hands over the
//! serialized [`types::SiteModel`] and [`pages::Page`] descriptors.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Discovers galleries and loads per-image capture times |
//! | [`metadata`] | `_metadata.toml` / `_metadata.json` loading and date parsing |
//! | [`naming`] | Directory-name date prefix parser, display names, highlight stems |
//! | [`resolve`] | Gallery id/name/date precedence builder |
//! | [`exif_cache`] | Build-scoped single-flight EXIF cache, persisted between builds |
//! | [`process`] | Content-addressed output names, mtime skip rule, parallel writes |
//! | [`imaging`] | Pure-Rust decode, orient, resize, crop, encode, EXIF read |
//! | [`aggregate`] | Image/gallery ordering, highlight selection, year grouping |
//! | [`pages`] | Page descriptors, URLs, titles, front-matter defaults chain |
//! | [`generate`] | Orchestrates the stages for one site |
//! | [`config`] | `[gallery]` table of `config.toml`: defaults, merging, validation |
//! | [`types`] | Model types and their template-facing serialization |
//! | [`logging`] | Subscriber setup and per-build message deduplication |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Names From Paths, Freshness From Timestamps
//!
//! Output names hash the site-relative source path, so they are stable across
//! builds and machines without reading image bytes. Whether an output is
//! current is decided by comparing whole-second mtimes: outputs are stamped
//! with their source's mtime when written. Editing an image in place bumps its
//! mtime and triggers a rewrite; restoring an older file with an older mtime
//! does too, since only equality counts.
//!
//! ## Galleries Without Dates Are Errors
//!
//! Year and month are part of every output path and URL, so a gallery must get
//! a date from its directory name, its images' EXIF, or its metadata file.
//! Guessing (e.g. from file mtimes) would silently move galleries between
//! years; the build fails instead and names the directory.
//!
//! ## Explicit Caches
//!
//! The EXIF cache is created by the caller and passed in. Tests run against
//! an in-memory cache; the CLI loads and saves one in the cache directory.

pub mod aggregate;
pub mod config;
pub mod exif_cache;
pub mod generate;
pub mod imaging;
pub mod logging;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod pages;
pub mod process;
pub mod resolve;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
