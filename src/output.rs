//! CLI output formatting for builds and checks.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Each gallery leads
//! with its positional index and display name; its id, date, and highlight
//! source follow as indented context lines. Galleries are grouped under
//! their year, newest first, the same order the index pages use.
//!
//! # Output Format
//!
//! ```text
//! Galleries
//! 2023
//!     001 Summer Trip (12 photos)
//!         Id: summer-trip
//!         Date: 2023-05-02
//!         Highlight: _galleries/2023-05-01_summer-trip/hl_dunes.heic
//! 2022
//!     001 Lisbon (3 photos)
//!         ...
//!
//! Pages
//! /gallery/2023/05/summer-trip.html → Photos | 2023 | Summer Trip
//! /gallery/2023/ → Photos | 2023
//!
//! EXIF: 14 cached, 1 read (15 total)
//! Images: 2 written, 28 up to date (30 total)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure and do no I/O.

use crate::generate::BuildOutput;
use crate::types::{Gallery, SiteModel};

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// ```text
/// 001 Summer Trip (12 photos)
/// 002 Lisbon (1 photo)
/// ```
fn entity_header(index: usize, title: &str, count: usize) -> String {
    let noun = if count == 1 { "photo" } else { "photos" };
    format!("{} {} ({} {})", format_index(index), title, count, noun)
}

fn gallery_lines(index: usize, gallery: &Gallery, depth: usize) -> Vec<String> {
    let context = indent(depth + 1);
    vec![
        format!("{}{}", indent(depth), entity_header(index, &gallery.name, gallery.images.len())),
        format!("{context}Id: {}", gallery.id),
        format!("{context}Date: {}", gallery.date.date()),
        format!("{context}Highlight: {}", gallery.highlight_image.source_path),
    ]
}

// ============================================================================
// Sections
// ============================================================================

/// Galleries grouped by year, newest year first.
pub fn format_galleries(model: &SiteModel) -> Vec<String> {
    let mut lines = vec!["Galleries".to_string()];
    if model.by_year.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
        return lines;
    }
    for group in &model.by_year {
        lines.push(group.year.to_string());
        for (i, gallery) in group.galleries.iter().enumerate() {
            lines.extend(gallery_lines(i + 1, gallery, 1));
        }
    }
    lines
}

/// Format the full build summary.
pub fn format_build_output(output: &BuildOutput) -> Vec<String> {
    let mut lines = format_galleries(&output.model);

    lines.push(String::new());
    lines.push("Pages".to_string());
    for page in &output.pages {
        lines.push(format!("{} → {}", page.url(), page.title()));
    }

    lines.push(String::new());
    lines.push(format!("EXIF: {}", output.exif_stats));
    lines.push(format!("Images: {}", output.write_stats));
    lines
}

pub fn print_build_output(output: &BuildOutput) {
    for line in format_build_output(output) {
        println!("{}", line);
    }
}

/// Format the check summary: galleries plus a one-line verdict.
pub fn format_check_output(output: &BuildOutput) -> Vec<String> {
    let mut lines = format_galleries(&output.model);
    let images: usize = output.model.galleries.iter().map(|g| g.images.len()).sum();
    lines.push(String::new());
    lines.push(format!(
        "{} galleries, {} images, {} pages",
        output.model.galleries.len(),
        images,
        output.pages.len()
    ));
    lines
}

pub fn print_check_output(output: &BuildOutput) {
    for line in format_check_output(output) {
        println!("{}", line);
    }
}
