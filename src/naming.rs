//! Centralized name parsing for gallery directories and image files.
//!
//! ## Gallery directories
//!
//! A gallery directory may carry a date prefix, `YYYY MM DD` with an optional
//! `-` or `_` between each part and before the rest of the name:
//!
//! - `2023-05-01_summer-trip` → id `summer-trip`, name "Summer Trip", 2023-05-01
//! - `20230501summer` → id `summer`, name "Summer", 2023-05-01
//! - `alps_hike` → id `alps_hike`, name "Alps Hike", no date
//!
//! ## Display names
//!
//! Names split on runs of `_`/`-`; every segment is capitalized (first
//! character upper, the rest lower) and the segments are joined by one space.
//!
//! ## Highlight images
//!
//! An image whose stem starts with `hl_` or ends with `_hl` represents its
//! gallery in listings. The match is case-sensitive.

use chrono::NaiveDate;

/// Result of parsing a gallery directory name.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedGalleryName {
    /// URL-facing identifier: the part after the date prefix, or the whole name.
    pub id: String,
    /// Display name derived from `id`.
    pub name: String,
    /// Raw date prefix as `(year, month, day)`, if the name has one. Not yet
    /// validated as a calendar date; see [`ParsedGalleryName::date`].
    pub date_parts: Option<(i32, u32, u32)>,
}

impl ParsedGalleryName {
    /// Calendar date of the prefix. `None` when there is no prefix;
    /// `Some(None)` when the prefix is not a real date (e.g. month 13).
    pub fn date(&self) -> Option<Option<NaiveDate>> {
        self.date_parts
            .map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
    }
}

/// Parse a directory name against `^(\d{4})[-_]?(\d{2})[-_]?(\d{2})[-_]?(.*)$`.
pub fn parse_gallery_dir_name(dir_name: &str) -> ParsedGalleryName {
    match split_date_prefix(dir_name) {
        Some((parts, rest)) => ParsedGalleryName {
            id: rest.to_string(),
            name: display_name(rest),
            date_parts: Some(parts),
        },
        None => ParsedGalleryName {
            id: dir_name.to_string(),
            name: display_name(dir_name),
            date_parts: None,
        },
    }
}

/// Split a leading `YYYY[-_]MM[-_]DD[-_]` off `name`.
///
/// Each separator is optional and consumed greedily; the regex can never
/// succeed by skipping a separator that is present, so no backtracking is
/// needed.
fn split_date_prefix(name: &str) -> Option<((i32, u32, u32), &str)> {
    let (year, rest) = take_digits(name, 4)?;
    let (month, rest) = take_digits(skip_separator(rest), 2)?;
    let (day, rest) = take_digits(skip_separator(rest), 2)?;
    let rest = skip_separator(rest);
    // `.` does not match a newline, so `(.*)$` rejects names containing one.
    if rest.contains('\n') {
        return None;
    }
    Some(((year as i32, month, day), rest))
}

fn take_digits(s: &str, count: usize) -> Option<(u32, &str)> {
    let digits = s.get(..count)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, &s[count..]))
}

fn skip_separator(s: &str) -> &str {
    s.strip_prefix(['-', '_']).unwrap_or(s)
}

/// Turn `summer_in-the--ALPS` into "Summer In The Alps".
pub fn display_name(raw: &str) -> String {
    raw.split(['_', '-'])
        .filter(|segment| !segment.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Whether an image file stem marks the gallery's highlight image.
pub fn is_highlight_stem(stem: &str) -> bool {
    stem.starts_with("hl_") || stem.ends_with("_hl")
}
