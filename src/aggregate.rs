//! Assembling galleries and the site model.
//!
//! Stage 4 of the build: turns resolved identities and processed images into
//! ordered [`Gallery`] values, then groups them by year.
//!
//! Ordering rules:
//! - images: capture time, newest first; images without one go last.
//! - galleries: date, newest first.
//! - years: ascending in [`SiteModel::gallery_years`], newest first in
//!   [`SiteModel::by_year`].
//!
//! Ties are broken by `source_path` (images) and `id` (galleries) so the
//! output never depends on filesystem order.

use crate::naming::is_highlight_stem;
use crate::resolve::GalleryIdentity;
use crate::types::{Gallery, GalleryImage, SiteModel, YearGroup};
use std::cmp::{Ordering, Reverse};

/// Sort newest first, undated images last.
pub fn sort_images(images: &mut [GalleryImage]) {
    images.sort_by(|a, b| {
        match (a.capture_time, b.capture_time) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.source_path.cmp(&b.source_path))
    });
}

/// First image marked as highlight, else the first image. Expects sorted input.
pub fn select_highlight(images: &[GalleryImage]) -> Option<&GalleryImage> {
    images
        .iter()
        .find(|img| is_highlight_stem(img.source_stem()))
        .or_else(|| images.first())
}

/// Build a gallery from its identity and processed images.
///
/// Returns `None` for a gallery without images.
pub fn assemble_gallery(identity: GalleryIdentity, mut images: Vec<GalleryImage>) -> Option<Gallery> {
    sort_images(&mut images);
    let highlight_image = select_highlight(&images)?.clone();
    Some(Gallery {
        id: identity.id,
        name: identity.name,
        images,
        highlight_image,
        date: identity.date,
        extra: identity.extra,
    })
}

/// Newest gallery first.
pub fn sort_galleries(galleries: &mut [Gallery]) {
    galleries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
}

/// Group sorted galleries by calendar year, newest year first. Order within a
/// year is kept.
pub fn group_by_year(galleries: &[Gallery]) -> Vec<YearGroup> {
    let mut groups: Vec<YearGroup> = Vec::new();
    for gallery in galleries {
        match groups.iter_mut().find(|g| g.year == gallery.year()) {
            Some(group) => group.galleries.push(gallery.clone()),
            None => groups.push(YearGroup {
                year: gallery.year(),
                galleries: vec![gallery.clone()],
            }),
        }
    }
    groups.sort_by_key(|g| Reverse(g.year));
    groups
}

/// Distinct years with at least one gallery, ascending.
pub fn gallery_years(galleries: &[Gallery]) -> Vec<i32> {
    let mut years: Vec<i32> = galleries.iter().map(Gallery::year).collect();
    years.sort_unstable();
    years.dedup();
    years
}

pub fn build_site_model(mut galleries: Vec<Gallery>) -> SiteModel {
    sort_galleries(&mut galleries);
    SiteModel {
        gallery_years: gallery_years(&galleries),
        by_year: group_by_year(&galleries),
        galleries,
    }
}
