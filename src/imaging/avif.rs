//! AVIF sources: `avif-parse` unpacks the container and `rav1d` decodes the
//! AV1 payload. The `image` crate only ships an AVIF encoder without the C
//! dav1d library.

use super::backend::{BackendError, Dimensions};
use image::{DynamicImage, RgbImage};
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::Dav1dSettings;
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use rav1d::src::lib::{
    dav1d_close, dav1d_data_create, dav1d_data_unref, dav1d_default_settings, dav1d_get_picture,
    dav1d_open, dav1d_picture_unref, dav1d_send_data,
};
use std::io::Cursor;
use std::mem::MaybeUninit;
use std::path::Path;
use std::ptr::NonNull;

fn failed(path: &Path, step: &str, detail: impl std::fmt::Debug) -> BackendError {
    BackendError::ProcessingFailed(format!(
        "Failed to decode AVIF {} ({step}): {detail:?}",
        path.display()
    ))
}

/// Dimensions from the container's image spatial extents, without decoding.
pub(super) fn identify(path: &Path) -> Result<Dimensions, BackendError> {
    let bytes = std::fs::read(path)?;
    let avif = avif_parse::read_avif(&mut Cursor::new(&bytes))
        .map_err(|e| failed(path, "container", e))?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| failed(path, "sequence header", e))?;
    Ok(Dimensions {
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
    })
}

pub(super) fn decode(path: &Path) -> Result<DynamicImage, BackendError> {
    let bytes = std::fs::read(path)?;
    let avif = avif_parse::read_avif(&mut Cursor::new(&bytes))
        .map_err(|e| failed(path, "container", e))?;
    let payload: &[u8] = &avif.primary_item;

    let mut settings = MaybeUninit::<Dav1dSettings>::uninit();
    unsafe { dav1d_default_settings(NonNull::from(&mut settings).cast()) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(failed(path, "open", rc.0));
    }

    // Every exit below goes through the single close after the closure.
    let decoded = (|| {
        let mut data = Dav1dData::default();
        let buf = unsafe { dav1d_data_create(NonNull::new(&mut data), payload.len()) };
        if buf.is_null() {
            return Err(failed(path, "data_create", payload.len()));
        }
        unsafe { std::ptr::copy_nonoverlapping(payload.as_ptr(), buf, payload.len()) };

        let rc = unsafe { dav1d_send_data(ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(failed(path, "send_data", rc.0));
        }

        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            return Err(failed(path, "get_picture", rc.0));
        }
        let rgb = picture_to_rgb(path, &pic);
        unsafe { dav1d_picture_unref(NonNull::new(&mut pic)) };
        rgb
    })();

    unsafe { dav1d_close(NonNull::new(&mut ctx)) };
    decoded
}

fn picture_to_rgb(path: &Path, pic: &Dav1dPicture) -> Result<DynamicImage, BackendError> {
    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let layout = pic.p.layout;
    let Some(luma) = pic.data[0] else {
        return Err(failed(path, "picture", "missing luma plane"));
    };
    let luma = luma.as_ptr() as *const u8;

    let (chroma, subsampling) = match layout {
        DAV1D_PIXEL_LAYOUT_I400 => (None, (false, false)),
        DAV1D_PIXEL_LAYOUT_I420 | DAV1D_PIXEL_LAYOUT_I422 | DAV1D_PIXEL_LAYOUT_I444 => {
            let (Some(cb), Some(cr)) = (pic.data[1], pic.data[2]) else {
                return Err(failed(path, "picture", "missing chroma planes"));
            };
            let subsampling = match layout {
                DAV1D_PIXEL_LAYOUT_I420 => (true, true),
                DAV1D_PIXEL_LAYOUT_I422 => (true, false),
                _ => (false, false),
            };
            (
                Some((cb.as_ptr() as *const u8, cr.as_ptr() as *const u8)),
                subsampling,
            )
        }
        other => return Err(failed(path, "pixel layout", other)),
    };

    let planes = YuvPlanes {
        luma,
        chroma,
        luma_stride: pic.stride[0],
        chroma_stride: pic.stride[1],
        width,
        height,
        bits: pic.p.bpc as u32,
        subsampling,
    };
    RgbImage::from_raw(width, height, planes.to_rgb8())
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| failed(path, "picture", "plane size mismatch"))
}

/// Borrowed views into a decoded picture's planes.
struct YuvPlanes {
    luma: *const u8,
    /// `None` for monochrome pictures.
    chroma: Option<(*const u8, *const u8)>,
    luma_stride: isize,
    chroma_stride: isize,
    width: u32,
    height: u32,
    bits: u32,
    /// Horizontal and vertical chroma halving.
    subsampling: (bool, bool),
}

impl YuvPlanes {
    /// Interleaved 8-bit RGB using BT.601 coefficients.
    fn to_rgb8(&self) -> Vec<u8> {
        let scale = 255.0 / ((1u32 << self.bits) - 1) as f32;
        let center = (1u32 << (self.bits - 1)) as f32;
        let (ss_x, ss_y) = self.subsampling;

        let mut rgb = Vec::with_capacity((self.width * self.height * 3) as usize);
        for row in 0..self.height {
            for col in 0..self.width {
                let y = self.sample(self.luma, self.luma_stride, col, row);
                let pixel = match self.chroma {
                    None => [y; 3],
                    Some((cb_plane, cr_plane)) => {
                        let cx = if ss_x { col / 2 } else { col };
                        let cy = if ss_y { row / 2 } else { row };
                        let cb = self.sample(cb_plane, self.chroma_stride, cx, cy) - center;
                        let cr = self.sample(cr_plane, self.chroma_stride, cx, cy) - center;
                        [
                            y + 1.402 * cr,
                            y - 0.344136 * cb - 0.714136 * cr,
                            y + 1.772 * cb,
                        ]
                    }
                };
                rgb.extend(pixel.map(|v| (v * scale).clamp(0.0, 255.0) as u8));
            }
        }
        rgb
    }

    /// One sample; depths above 8 bits are stored as native-endian u16.
    fn sample(&self, plane: *const u8, stride: isize, x: u32, y: u32) -> f32 {
        let row = y as isize * stride;
        if self.bits <= 8 {
            (unsafe { *plane.offset(row + x as isize) }) as f32
        } else {
            (unsafe { (plane.offset(row + x as isize * 2) as *const u16).read_unaligned() }) as f32
        }
    }
}
