//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the operations the pipeline needs:
//! identify, read_metadata, resize, and thumbnail. The production
//! implementation is [`RustBackend`](super::rust_backend::RustBackend).

use super::params::{ResizeParams, ThumbnailParams};
use chrono::NaiveDateTime;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Embedded metadata the pipeline cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    /// EXIF `DateTimeOriginal`.
    pub capture_time: Option<NaiveDateTime>,
}

/// Trait for image processing backends.
///
/// Both write operations must auto-orient from embedded orientation metadata
/// and must not carry EXIF/ICC data into the output.
pub trait ImageBackend: Sync {
    /// Get image dimensions, as stored (before orientation).
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Read embedded capture metadata. Images without EXIF yield the default.
    fn read_metadata(&self, path: &Path) -> Result<ImageMetadata, BackendError>;

    /// Write the full-size variant (resize-within, never upscale).
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;

    /// Write the thumbnail variant (crop-to-fill, exact size).
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError>;
}
