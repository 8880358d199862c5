//! HEIC/HEIF sources through `libheif-rs`, compiled in with the `heif` cargo
//! feature. libheif applies the container's rotation and mirror transforms
//! while decoding, so the result is already display-oriented.
//!
//! Without the feature both entry points fail with an error naming it.

use super::backend::{BackendError, Dimensions};
use image::DynamicImage;
use std::path::Path;

#[cfg(feature = "heif")]
mod libheif {
    use super::super::backend::{BackendError, Dimensions};
    use image::{DynamicImage, RgbImage};
    use libheif_rs::{ColorSpace, HeifContext, ImageHandle, LibHeif, RgbChroma};
    use std::path::Path;

    fn failed(path: &Path, e: impl std::fmt::Display) -> BackendError {
        BackendError::ProcessingFailed(format!("Failed to decode HEIF {}: {e}", path.display()))
    }

    fn with_primary<T>(
        path: &Path,
        f: impl FnOnce(&ImageHandle) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let name = path
            .to_str()
            .ok_or_else(|| failed(path, "path is not valid UTF-8"))?;
        let ctx = HeifContext::read_from_file(name).map_err(|e| failed(path, e))?;
        let handle = ctx.primary_image_handle().map_err(|e| failed(path, e))?;
        f(&handle)
    }

    pub fn identify(path: &Path) -> Result<Dimensions, BackendError> {
        with_primary(path, |handle| {
            Ok(Dimensions {
                width: handle.width(),
                height: handle.height(),
            })
        })
    }

    pub fn decode(path: &Path) -> Result<DynamicImage, BackendError> {
        with_primary(path, |handle| {
            let lib = LibHeif::new();
            let image = lib
                .decode(handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
                .map_err(|e| failed(path, e))?;
            let planes = image.planes();
            let plane = planes
                .interleaved
                .ok_or_else(|| failed(path, "no interleaved RGB plane"))?;

            let row_len = plane.width as usize * 3;
            let mut rgb = Vec::with_capacity(row_len * plane.height as usize);
            for row in plane.data.chunks(plane.stride).take(plane.height as usize) {
                rgb.extend_from_slice(&row[..row_len]);
            }
            RgbImage::from_raw(plane.width, plane.height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| failed(path, "plane size mismatch"))
        })
    }
}

#[cfg(not(feature = "heif"))]
fn disabled(path: &Path) -> BackendError {
    BackendError::ProcessingFailed(format!(
        "Cannot decode {}: HEIF support requires building with the `heif` feature",
        path.display()
    ))
}

pub(super) fn identify(path: &Path) -> Result<Dimensions, BackendError> {
    #[cfg(feature = "heif")]
    return libheif::identify(path);
    #[cfg(not(feature = "heif"))]
    Err(disabled(path))
}

pub(super) fn decode(path: &Path) -> Result<DynamicImage, BackendError> {
    #[cfg(feature = "heif")]
    return libheif::decode(path);
    #[cfg(not(feature = "heif"))]
    Err(disabled(path))
}
