//! Gallery identity resolution.
//!
//! A gallery's id, display name and date come from three sources, applied in
//! a fixed order by [`IdentityBuilder`]:
//!
//! 1. the directory name ([`parse_gallery_dir_name`]),
//! 2. the earliest EXIF capture time among its images (overwrites the date),
//! 3. the metadata file (overwrites any field it names; applied last, wins).
//!
//! A gallery that ends up without a date is a fatal error.

use crate::metadata::MetadataOverrides;
use crate::naming::parse_gallery_dir_name;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ResolveError {
    #[error("Gallery directory '{dir}' starts with {prefix}, which is not a valid date")]
    InvalidDirectoryDate { dir: String, prefix: String },
    #[error(
        "Could not determine a date for gallery '{dir}'. Use one of: \
         a YYYY-MM-DD prefix on the directory name, \
         EXIF DateTimeOriginal on at least one image, \
         or a 'datetime' key in its _metadata file"
    )]
    NoDate { dir: String },
}

/// Resolved identity of one gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryIdentity {
    pub id: String,
    pub name: String,
    pub date: NaiveDateTime,
    /// Metadata keys without a dedicated field, passed through verbatim.
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Applies identity sources in precedence order. Each step consumes and
/// returns the builder, so the order is visible at the call site.
#[derive(Debug, Clone)]
pub struct IdentityBuilder {
    /// Directory label used in error messages.
    dir: String,
    id: String,
    name: String,
    date: Option<NaiveDateTime>,
    extra: BTreeMap<String, serde_json::Value>,
}

impl IdentityBuilder {
    /// Start from the directory name. `dir` is only used in messages.
    pub fn from_dir_name(dir: &str, dir_name: &str) -> Result<Self, ResolveError> {
        let parsed = parse_gallery_dir_name(dir_name);
        let date = match parsed.date() {
            None => {
                tracing::debug!("Directory name '{dir_name}' has no date prefix");
                None
            }
            Some(Some(date)) => Some(date.and_time(chrono::NaiveTime::MIN)),
            Some(None) => {
                let prefix = parsed
                    .date_parts
                    .map(|(y, m, d)| format!("{y:04}-{m:02}-{d:02}"))
                    .unwrap_or_default();
                return Err(ResolveError::InvalidDirectoryDate {
                    dir: dir.to_string(),
                    prefix,
                });
            }
        };
        Ok(Self {
            dir: dir.to_string(),
            id: parsed.id,
            name: parsed.name,
            date,
            extra: BTreeMap::new(),
        })
    }

    /// Overwrite the date with the earliest known capture time, if any.
    pub fn with_capture_times<I>(mut self, times: I) -> Self
    where
        I: IntoIterator<Item = Option<NaiveDateTime>>,
    {
        if let Some(earliest) = times.into_iter().flatten().min() {
            self.date = Some(earliest);
        }
        self
    }

    /// Overwrite every field the metadata file sets.
    pub fn with_metadata(mut self, overrides: Option<MetadataOverrides>) -> Self {
        let Some(overrides) = overrides else {
            return self;
        };
        if let Some(id) = overrides.id {
            self.id = id;
        }
        if let Some(name) = overrides.name {
            self.name = name;
        }
        if let Some(datetime) = overrides.datetime {
            self.date = Some(datetime);
        }
        self.extra.extend(overrides.extra);
        self
    }

    pub fn build(self) -> Result<GalleryIdentity, ResolveError> {
        let date = self.date.ok_or(ResolveError::NoDate { dir: self.dir })?;
        Ok(GalleryIdentity {
            id: self.id,
            name: self.name,
            date,
            extra: self.extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::dt;

    fn builder(dir_name: &str) -> IdentityBuilder {
        IdentityBuilder::from_dir_name(&format!("_galleries/{dir_name}"), dir_name).unwrap()
    }

    #[test]
    fn directory_date_only() {
        let identity = builder("2023-05-01_summer-trip").build().unwrap();
        assert_eq!(identity.id, "summer-trip");
        assert_eq!(identity.name, "Summer Trip");
        assert_eq!(identity.date, dt(2023, 5, 1, 0, 0, 0));
        assert!(identity.extra.is_empty());
    }

    #[test]
    fn exif_earliest_overwrites_directory_date() {
        let identity = builder("2023-05-01_trip")
            .with_capture_times([
                Some(dt(2023, 5, 3, 9, 0, 0)),
                None,
                Some(dt(2023, 5, 2, 18, 30, 0)),
            ])
            .build()
            .unwrap();
        assert_eq!(identity.date, dt(2023, 5, 2, 18, 30, 0));
    }

    #[test]
    fn exif_supplies_date_for_undated_directory() {
        let identity = builder("alps")
            .with_capture_times([Some(dt(2019, 8, 10, 7, 0, 0))])
            .build()
            .unwrap();
        assert_eq!(identity.id, "alps");
        assert_eq!(identity.date, dt(2019, 8, 10, 7, 0, 0));
    }

    #[test]
    fn images_without_capture_time_leave_date_alone() {
        let identity = builder("2021-01-02_x")
            .with_capture_times([None, None])
            .build()
            .unwrap();
        assert_eq!(identity.date, dt(2021, 1, 2, 0, 0, 0));
    }

    #[test]
    fn metadata_wins_over_everything() {
        let mut extra = BTreeMap::new();
        extra.insert("location".to_string(), serde_json::json!("Lisbon"));
        let overrides = MetadataOverrides {
            id: Some("lisbon".into()),
            name: Some("Lisbon in Spring".into()),
            datetime: Some(dt(2022, 4, 1, 10, 0, 0)),
            extra,
        };

        let identity = builder("2023-05-01_trip")
            .with_capture_times([Some(dt(2023, 5, 2, 0, 0, 0))])
            .with_metadata(Some(overrides))
            .build()
            .unwrap();

        assert_eq!(identity.id, "lisbon");
        assert_eq!(identity.name, "Lisbon in Spring");
        assert_eq!(identity.date, dt(2022, 4, 1, 10, 0, 0));
        assert_eq!(identity.extra["location"], "Lisbon");
    }

    #[test]
    fn metadata_without_datetime_keeps_resolved_date() {
        let overrides = MetadataOverrides {
            name: Some("Renamed".into()),
            ..Default::default()
        };
        let identity = builder("2023-05-01_trip")
            .with_metadata(Some(overrides))
            .build()
            .unwrap();
        assert_eq!(identity.id, "trip");
        assert_eq!(identity.name, "Renamed");
        assert_eq!(identity.date, dt(2023, 5, 1, 0, 0, 0));
    }

    #[test]
    fn metadata_datetime_rescues_undated_gallery() {
        let overrides = MetadataOverrides {
            datetime: Some(dt(2010, 10, 10, 0, 0, 0)),
            ..Default::default()
        };
        let identity = builder("old-scans").with_metadata(Some(overrides)).build().unwrap();
        assert_eq!(identity.date, dt(2010, 10, 10, 0, 0, 0));
    }

    #[test]
    fn no_date_anywhere_is_fatal() {
        let err = builder("misc")
            .with_capture_times([None])
            .with_metadata(None)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::NoDate {
                dir: "_galleries/misc".into()
            }
        );
        let message = err.to_string();
        assert!(message.contains("_galleries/misc"));
        assert!(message.contains("YYYY-MM-DD prefix"));
        assert!(message.contains("EXIF DateTimeOriginal"));
        assert!(message.contains("'datetime' key"));
    }

    #[test]
    fn invalid_calendar_prefix_is_fatal() {
        let err = IdentityBuilder::from_dir_name("_galleries/2023-13-45_x", "2023-13-45_x")
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::InvalidDirectoryDate {
                dir: "_galleries/2023-13-45_x".into(),
                prefix: "2023-13-45".into(),
            }
        );
    }
}
