//! Page descriptors handed to the host site's renderer.
//!
//! The pipeline does not render HTML. It describes the pages the site needs:
//!
//! | Page | URL | Layout |
//! |---|---|---|
//! | One per gallery | `/<path>/<year>/<MM>/<id>.html` | `gallery_page` |
//! | One per year | `/<path>/<year>/` | `gallery_index` |
//! | Root index (optional) | `/<path>/` | `gallery_index` (latest year) |
//!
//! Front-matter lookups go through [`Page::get`]: the page's own fields
//! first, then a [`FrontMatterDefaults`] provider for the page's scope.

use crate::config::GalleryConfig;
use crate::types::{Gallery, SiteModel};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Defaults scope a page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultsScope {
    Galleries,
    GalleryIndexes,
}

impl DefaultsScope {
    pub fn as_str(self) -> &'static str {
        match self {
            DefaultsScope::Galleries => "galleries",
            DefaultsScope::GalleryIndexes => "gallery_indexes",
        }
    }
}

/// Source of front-matter values a page doesn't set itself.
pub trait FrontMatterDefaults {
    fn find(&self, relative_path: &str, scope: DefaultsScope, key: &str) -> Option<Value>;
}

/// Provider with no defaults at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDefaults;

impl FrontMatterDefaults for NoDefaults {
    fn find(&self, _relative_path: &str, _scope: DefaultsScope, _key: &str) -> Option<Value> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Gallery,
    GalleryIndex,
}

impl PageKind {
    pub fn layout(self) -> &'static str {
        match self {
            PageKind::Gallery => "gallery_page",
            PageKind::GalleryIndex => "gallery_index",
        }
    }

    pub fn scope(self) -> DefaultsScope {
        match self {
            PageKind::Gallery => DefaultsScope::Galleries,
            PageKind::GalleryIndex => DefaultsScope::GalleryIndexes,
        }
    }
}

/// A page the renderer should produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub kind: PageKind,
    /// Directory segments under the site root.
    pub dir: Vec<String>,
    /// File stem: the gallery id, or `index`.
    pub basename: String,
    /// Front matter set by the pipeline.
    pub data: BTreeMap<String, Value>,
}

impl Page {
    /// Path relative to the site root, e.g. `gallery/2023/05/trip.html`.
    pub fn relative_path(&self) -> String {
        let mut parts = self.dir.clone();
        parts.push(format!("{}.html", self.basename));
        parts.join("/")
    }

    pub fn url(&self) -> String {
        match self.kind {
            PageKind::Gallery => format!("/{}", self.relative_path()),
            PageKind::GalleryIndex => dir_url(&self.dir),
        }
    }

    /// Front-matter value for `key`: the page's own data, then `defaults`.
    pub fn get(&self, key: &str, defaults: &dyn FrontMatterDefaults) -> Option<Value> {
        self.data
            .get(key)
            .cloned()
            .or_else(|| defaults.find(&self.relative_path(), self.kind.scope(), key))
    }

    pub fn title(&self) -> &str {
        self.data
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

fn dir_url(segments: &[String]) -> String {
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    }
}

fn segments(config: &GalleryConfig, year: Option<i32>, month: Option<u32>) -> Vec<String> {
    let mut parts: Vec<String> = config
        .path_segments()
        .into_iter()
        .map(str::to_string)
        .collect();
    if let Some(year) = year {
        parts.push(year.to_string());
    }
    if let Some(month) = month {
        parts.push(format!("{month:02}"));
    }
    parts
}

fn title(config: &GalleryConfig, parts: &[&str]) -> String {
    parts.join(&format!(" {} ", config.title_seperator))
}

pub fn gallery_url(config: &GalleryConfig, gallery: &Gallery) -> String {
    let dir = segments(config, Some(gallery.year()), Some(gallery.month()));
    format!("/{}/{}.html", dir.join("/"), gallery.id)
}

pub fn gallery_index_url(config: &GalleryConfig, year: i32) -> String {
    dir_url(&segments(config, Some(year), None))
}

pub fn gallery_page(config: &GalleryConfig, gallery: &Gallery) -> Result<Page, serde_json::Error> {
    let year = gallery.year().to_string();
    let mut data = BTreeMap::new();
    data.insert("layout".into(), json!(PageKind::Gallery.layout()));
    data.insert("gallery".into(), serde_json::to_value(gallery)?);
    data.insert("year".into(), json!(gallery.year()));
    data.insert(
        "title".into(),
        json!(title(
            config,
            &[config.title_prefix.as_str(), year.as_str(), gallery.name.as_str()]
        )),
    );
    Ok(Page {
        kind: PageKind::Gallery,
        dir: segments(config, Some(gallery.year()), Some(gallery.month())),
        basename: gallery.id.clone(),
        data,
    })
}

/// Index page for one year. `dir` overrides the default `<path>/<year>`.
pub fn gallery_index_page(
    config: &GalleryConfig,
    year: i32,
    galleries: &[Gallery],
    dir: Option<Vec<String>>,
) -> Result<Page, serde_json::Error> {
    let mut data = BTreeMap::new();
    data.insert("layout".into(), json!(PageKind::GalleryIndex.layout()));
    data.insert("year".into(), json!(year));
    data.insert("galleries".into(), serde_json::to_value(galleries)?);
    data.insert(
        "title".into(),
        json!(title(
            config,
            &[config.title_prefix.as_str(), year.to_string().as_str()]
        )),
    );
    Ok(Page {
        kind: PageKind::GalleryIndex,
        dir: dir.unwrap_or_else(|| segments(config, Some(year), None)),
        basename: "index".into(),
        data,
    })
}

/// Every page for the model: galleries in model order, then one index per
/// year (newest first), then the optional root index.
pub fn build_pages(config: &GalleryConfig, model: &SiteModel) -> Result<Vec<Page>, serde_json::Error> {
    let mut pages = model
        .galleries
        .iter()
        .map(|gallery| gallery_page(config, gallery))
        .collect::<Result<Vec<_>, _>>()?;

    for group in &model.by_year {
        pages.push(gallery_index_page(config, group.year, &group.galleries, None)?);
    }

    if config.generate_root_index
        && let Some(latest) = model.by_year.first()
    {
        pages.push(gallery_index_page(
            config,
            latest.year,
            &latest.galleries,
            Some(segments(config, None, None)),
        )?);
    }

    Ok(pages)
}
