//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image` crate (pure Rust decoders) |
//! | Decode AVIF | `avif-parse` + `rav1d` |
//! | Decode HEIC/HEIF | `libheif-rs` (`heif` feature) |
//! | Auto-orient | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize-within | `calculate_fit_dimensions` + `resize_exact` (Lanczos3) |
//! | Crop-to-fill | `calculate_fill_dimensions` + `resize_exact` + centered `crop_imm` |
//! | Encode | `JpegEncoder` (quality) / `PngEncoder` |
//! | EXIF capture time | `kamadak-exif` |
//!
//! Outputs never carry EXIF or ICC data: the encoders only write pixels, which
//! is how metadata gets stripped.

use super::backend::{BackendError, Dimensions, ImageBackend, ImageMetadata};
use super::{avif, heif};
use super::calculations::{
    calculate_fill_dimensions, calculate_fit_dimensions, center_crop_offset,
};
use super::params::{OutputFormat, Quality, ResizeParams, ThumbnailParams};
use crate::metadata::parse_exif_datetime;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, e: impl std::fmt::Display) -> BackendError {
    BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
}

/// Decoder family, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Avif,
    Heif,
    Image,
}

fn codec_for(path: &Path) -> Codec {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "avif" => Codec::Avif,
        "heic" | "heif" => Codec::Heif,
        _ => Codec::Image,
    }
}

/// Load, decode and auto-orient an image.
fn load_oriented(path: &Path) -> Result<DynamicImage, BackendError> {
    match codec_for(path) {
        Codec::Avif => return avif::decode(path),
        Codec::Heif => return heif::decode(path),
        Codec::Image => {}
    }
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(|e| decode_error(path, e))?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(path, e))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Encode `img` to `path` in the requested format.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: Quality,
) -> Result<(), BackendError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let encoded = match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel and no 16-bit mode.
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality.value() as u8);
            rgb.write_with_encoder(encoder)
        }
        OutputFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            match img {
                DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                    DynamicImage::ImageRgba16(img.to_rgba16()).write_with_encoder(encoder)
                }
                _ => img.write_with_encoder(encoder),
            }
        }
    };
    encoded.map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to encode {}: {}", path.display(), e))
    })?;
    writer.flush()?;
    Ok(())
}

fn read_capture_time(path: &Path) -> Result<ImageMetadata, BackendError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(exif::Error::Io(e)) => return Err(BackendError::Io(e)),
        Err(e) => {
            tracing::debug!("No EXIF data in {}: {}", path.display(), e);
            return Ok(ImageMetadata::default());
        }
    };

    let capture_time = exif
        .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
        .and_then(|field| match &field.value {
            exif::Value::Ascii(parts) => parts.first(),
            _ => None,
        })
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .and_then(parse_exif_datetime);

    Ok(ImageMetadata { capture_time })
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        match codec_for(path) {
            Codec::Avif => return avif::identify(path),
            Codec::Heif => return heif::identify(path),
            Codec::Image => {}
        }
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Dimensions { width, height })
    }

    fn read_metadata(&self, path: &Path) -> Result<ImageMetadata, BackendError> {
        read_capture_time(path)
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_oriented(&params.source)?;
        let img = match params.bounds {
            Some(bounds) => {
                let source = (img.width(), img.height());
                let (w, h) = calculate_fit_dimensions(source, bounds);
                if (w, h) == source {
                    img
                } else {
                    img.resize_exact(w, h, FilterType::Lanczos3)
                }
            }
            None => img,
        };
        save_image(&img, &params.output, params.format, params.quality)
    }

    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError> {
        let img = load_oriented(&params.source)?;
        let target = (params.width, params.height);
        let (fill_w, fill_h) = calculate_fill_dimensions((img.width(), img.height()), target);
        let filled = img.resize_exact(fill_w, fill_h, FilterType::Lanczos3);
        let (x, y) = center_crop_offset((fill_w, fill_h), target);
        let cropped = filled.crop_imm(x, y, params.width, params.height);
        save_image(&cropped, &params.output, params.format, params.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{jpeg_with_exif, write_jpeg, write_png};

    fn resize_params(source: &Path, output: &Path, bounds: Option<(u32, u32)>) -> ResizeParams {
        ResizeParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            bounds,
            format: OutputFormat::Jpeg,
            quality: Quality::new(85),
        }
    }

    fn thumb_params(source: &Path, output: &Path, w: u32, h: u32) -> ThumbnailParams {
        ThumbnailParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            width: w,
            height: h,
            format: OutputFormat::Jpeg,
            quality: Quality::new(85),
        }
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        write_jpeg(&path, 200, 150);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let result = RustBackend::new().identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn read_metadata_without_exif_returns_default() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        write_jpeg(&path, 100, 100);

        let meta = RustBackend::new().read_metadata(&path).unwrap();
        assert_eq!(meta, ImageMetadata::default());
    }

    #[test]
    fn read_metadata_reads_date_time_original() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("dated.jpg");
        std::fs::write(&path, jpeg_with_exif(64, 48, Some("2023:05:01 18:30:00"), None)).unwrap();

        let meta = RustBackend::new().read_metadata(&path).unwrap();
        assert_eq!(
            meta.capture_time,
            chrono::NaiveDate::from_ymd_opt(2023, 5, 1).and_then(|d| d.and_hms_opt(18, 30, 0))
        );
    }

    #[test]
    fn read_metadata_missing_file_is_io_error() {
        let result = RustBackend::new().read_metadata(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn resize_within_shrinks_and_keeps_aspect() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        let output = tmp.path().join("out.jpg");
        write_jpeg(&source, 400, 300);

        RustBackend::new()
            .resize(&resize_params(&source, &output, Some((200, 200))))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (200, 150));
    }

    #[test]
    fn resize_within_never_upscales() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        let output = tmp.path().join("out.jpg");
        write_jpeg(&source, 120, 80);

        RustBackend::new()
            .resize(&resize_params(&source, &output, Some((1000, 1000))))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (120, 80));
    }

    #[test]
    fn resize_without_bounds_keeps_size() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        let output = tmp.path().join("out.jpg");
        write_jpeg(&source, 321, 123);

        RustBackend::new()
            .resize(&resize_params(&source, &output, None))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (321, 123));
    }

    #[test]
    fn resize_strips_exif() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        let output = tmp.path().join("out.jpg");
        std::fs::write(&source, jpeg_with_exif(64, 48, Some("2023:05:01 18:30:00"), None)).unwrap();

        let backend = RustBackend::new();
        backend
            .resize(&resize_params(&source, &output, None))
            .unwrap();

        assert_eq!(backend.read_metadata(&output).unwrap(), ImageMetadata::default());
    }

    #[test]
    fn resize_applies_exif_orientation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("rotated.jpg");
        let output = tmp.path().join("out.jpg");
        // Orientation 6: stored landscape, displayed rotated 90° clockwise
        std::fs::write(&source, jpeg_with_exif(80, 40, None, Some(6))).unwrap();

        RustBackend::new()
            .resize(&resize_params(&source, &output, None))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (40, 80));
    }

    #[test]
    fn thumbnail_exact_dimensions_for_any_aspect() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = RustBackend::new();

        for (i, (w, h)) in [(800, 600), (600, 800), (100, 50), (512, 512)].into_iter().enumerate() {
            let source = tmp.path().join(format!("source{i}.jpg"));
            let output = tmp.path().join(format!("thumb{i}.jpg"));
            write_jpeg(&source, w, h);

            backend
                .thumbnail(&thumb_params(&source, &output, 128, 96))
                .unwrap();

            assert_eq!(
                image::image_dimensions(&output).unwrap(),
                (128, 96),
                "source {w}x{h}"
            );
        }
    }

    #[test]
    fn png_output_from_png_with_alpha() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("alpha.png");
        let output = tmp.path().join("out.png");
        write_png(&source, 64, 64);

        RustBackend::new()
            .thumbnail(&ThumbnailParams {
                format: OutputFormat::Png,
                ..thumb_params(&source, &output, 32, 16)
            })
            .unwrap();

        let format = image::ImageReader::open(&output)
            .unwrap()
            .with_guessed_format()
            .unwrap()
            .format();
        assert_eq!(format, Some(image::ImageFormat::Png));
        assert_eq!(image::image_dimensions(&output).unwrap(), (32, 16));
    }

    #[test]
    fn jpeg_output_from_png_with_alpha() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("alpha.png");
        let output = tmp.path().join("out.jpg");
        write_png(&source, 64, 64);

        RustBackend::new()
            .resize(&resize_params(&source, &output, None))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (64, 64));
    }

    #[test]
    fn codec_follows_extension_case_insensitively() {
        assert_eq!(codec_for(Path::new("a/IMG_1.HEIC")), Codec::Heif);
        assert_eq!(codec_for(Path::new("a/IMG_1.heif")), Codec::Heif);
        assert_eq!(codec_for(Path::new("a/IMG_1.Avif")), Codec::Avif);
        assert_eq!(codec_for(Path::new("a/scan.tiff")), Codec::Image);
        assert_eq!(codec_for(Path::new("a/no_extension")), Codec::Image);
    }

    #[test]
    fn tiff_source_becomes_png() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("scan.tiff");
        let output = tmp.path().join("out.png");
        image::RgbImage::from_pixel(90, 60, image::Rgb([40, 80, 120]))
            .save(&source)
            .unwrap();

        let backend = RustBackend::new();
        assert_eq!(
            backend.identify(&source).unwrap(),
            Dimensions { width: 90, height: 60 }
        );
        backend
            .resize(&ResizeParams {
                format: OutputFormat::Png,
                ..resize_params(&source, &output, Some((45, 45)))
            })
            .unwrap();

        let format = image::ImageReader::open(&output)
            .unwrap()
            .with_guessed_format()
            .unwrap()
            .format();
        assert_eq!(format, Some(image::ImageFormat::Png));
        assert_eq!(image::image_dimensions(&output).unwrap(), (45, 30));
    }

    #[test]
    fn corrupt_avif_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.AVIF");
        let output = tmp.path().join("out.png");
        std::fs::write(&source, b"definitely not an avif").unwrap();

        let backend = RustBackend::new();
        assert!(backend.identify(&source).is_err());
        assert!(backend.resize(&resize_params(&source, &output, None)).is_err());
        assert!(!output.exists());
    }

    #[cfg(not(feature = "heif"))]
    #[test]
    fn heic_without_feature_reports_it() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("IMG_0001.heic");
        let output = tmp.path().join("out.png");
        std::fs::write(&source, b"ftypheic").unwrap();

        let err = RustBackend::new()
            .thumbnail(&thumb_params(&source, &output, 32, 32))
            .unwrap_err();
        assert!(err.to_string().contains("`heif` feature"), "{err}");
    }

    #[test]
    fn corrupt_source_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        let output = tmp.path().join("out.jpg");
        std::fs::write(&source, b"definitely not a jpeg").unwrap();

        let result = RustBackend::new().resize(&resize_params(&source, &output, None));
        assert!(result.is_err());
    }
}
