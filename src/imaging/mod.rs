//! Image processing in pure Rust, no external binaries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions`; AVIF/HEIF container headers |
//! | **Capture time** | `kamadak-exif` (`DateTimeOriginal`) |
//! | **Full image** | resize-within, Lanczos3, auto-orient |
//! | **Thumbnail** | crop-to-fill, Lanczos3, auto-orient |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Codecs**: AVIF (`rav1d`) and HEIF (`libheif-rs`) decoders the `image`
//!   crate lacks

mod avif;
pub mod backend;
mod calculations;
mod heif;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, ImageMetadata};
pub use params::{OutputFormat, Quality, ResizeParams, ThumbnailParams};
pub use rust_backend::RustBackend;
