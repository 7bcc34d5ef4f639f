//! CLI output formatting.
//!
//! Every command has a `format_*` function returning lines, for testability,
//! and a `print_*` wrapper that writes them to stdout. Format functions do
//! no I/O. Diagnostics that are not part of the normal report go through
//! `tracing` instead.
//!
//! # Output Format
//!
//! ## Load
//!
//! ```text
//! Load 3 albums and 42 images
//! Hidden albums
//!     drafts Work in progress
//! ```
//!
//! ## Build
//!
//! ```text
//! Lake weekend (2 photos, 1 videos)
//!     001 IMG_0001.jpg
//!         big: written
//!         thumb: cached
//!     001 clip.mp4
//!         video: written
//!     [Lake weekend] 1 of 4 resizes
//!     [Lake weekend] 1 of 1 copied videos
//! ```
//!
//! ## Check
//!
//! ```text
//! Albums
//! 001 Lake weekend (2 photos)
//!     Id: 5f0c...
//!     Date: 2019-07-14
//!     Source: photos/2019-07-14 - Lake/behappy.toml
//!     001 Day one (1 photos)
//!         Id: ...
//! ```

use crate::gallery::{Album, Gallery};
use crate::media::AlbumMedia;
use crate::process::{BuildReport, ProcessEvent, VariantStatus};
use std::collections::HashMap;
use std::path::Path;
use walkdir::WalkDir;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn counts(images: usize, videos: usize) -> String {
    if videos > 0 {
        format!("({} photos, {} videos)", images, videos)
    } else {
        format!("({} photos)", images)
    }
}

fn status_label(status: VariantStatus) -> &'static str {
    match status {
        VariantStatus::Cached => "cached",
        VariantStatus::Written => "written",
        VariantStatus::Failed => "FAILED",
    }
}

// ============================================================================
// Load
// ============================================================================

/// Album and image totals, then any hidden top albums.
pub fn format_load_summary(gallery: &Gallery, image_count: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "Load {} albums and {} images",
        gallery.len(),
        image_count
    )];
    let hidden = gallery.top_hidden_albums();
    if !hidden.is_empty() {
        lines.push("Hidden albums".to_string());
        for album in hidden {
            lines.push(format!("{}{} {}", indent(1), album.id, album.title));
        }
    }
    lines
}

pub fn print_load_summary(gallery: &Gallery, image_count: usize) {
    for line in format_load_summary(gallery, image_count) {
        println!("{}", line);
    }
}

// ============================================================================
// Build progress
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::AlbumStarted {
            title,
            image_count,
            video_count,
        } => vec![format!("{} {}", title, counts(*image_count, *video_count))],
        ProcessEvent::ImageProcessed {
            index,
            source_path,
            variants,
        } => {
            let mut lines = vec![format!("{}{} {}", indent(1), format_index(*index), source_path)];
            for variant in variants {
                lines.push(format!(
                    "{}{}: {}",
                    indent(2),
                    variant.label,
                    status_label(variant.status)
                ));
            }
            lines
        }
        ProcessEvent::VideoCopied {
            index,
            source_path,
            status,
        } => vec![
            format!("{}{} {}", indent(1), format_index(*index), source_path),
            format!("{}video: {}", indent(2), status_label(*status)),
        ],
        ProcessEvent::AlbumFinished(report) => {
            let mut lines = vec![format!(
                "{}[{}] {} of {} resizes",
                indent(1),
                report.title,
                report.resizes_written,
                report.resizes_total
            )];
            if report.videos_total > 0 {
                lines.push(format!(
                    "{}[{}] {} of {} copied videos",
                    indent(1),
                    report.title,
                    report.videos_copied,
                    report.videos_total
                ));
            }
            lines
        }
        ProcessEvent::AlbumFailed(failure) => {
            vec![format!("{} FAILED: {}", failure.title, failure.error)]
        }
    }
}

// ============================================================================
// Build summary
// ============================================================================

/// Totals, cache use, skipped albums and every failed task.
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = vec![
        format!("Cache: {}", report.cache()),
        format!(
            "Built {} albums: {} resizes written, {} videos copied",
            report.albums.len(),
            report.resizes_written(),
            report.videos_copied()
        ),
    ];
    if !report.album_failures.is_empty() {
        lines.push(format!("{} albums skipped", report.album_failures.len()));
        for failure in &report.album_failures {
            lines.push(format!("{}{}: {}", indent(1), failure.id, failure.error));
        }
    }
    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        lines.push(format!("{} tasks failed", failures.len()));
        for failure in failures {
            lines.push(format!(
                "{}{} [{}]: {}",
                indent(1),
                failure.source.display(),
                failure.variant,
                failure.error
            ));
        }
    }
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

fn album_lines(
    gallery: &Gallery,
    album: &Album,
    index: usize,
    depth: usize,
    media: &HashMap<String, AlbumMedia>,
    lines: &mut Vec<String>,
) {
    let (images, videos) = media
        .get(&album.id)
        .map(|m| (m.images.len(), m.videos.len()))
        .unwrap_or_default();
    lines.push(format!(
        "{}{} {} {}",
        indent(depth),
        format_index(index),
        album.title,
        counts(images, videos)
    ));
    let ctx = indent(depth + 1);
    lines.push(format!("{}Id: {}", ctx, album.id));
    lines.push(format!("{}Date: {}", ctx, album.date.format("%Y-%m-%d")));
    if !album.tags.is_empty() {
        let tags: Vec<&str> = album.tags.iter().map(String::as_str).collect();
        lines.push(format!("{}Tags: {}", ctx, tags.join(", ")));
    }
    lines.push(format!("{}Source: {}", ctx, album.source_path.display()));
    for (i, child) in gallery.children(album).into_iter().enumerate() {
        album_lines(gallery, child, i + 1, depth + 1, media, lines);
    }
}

/// The album tree: top albums, hidden albums, then albums whose parent is
/// not loaded.
pub fn format_check(gallery: &Gallery, media: &HashMap<String, AlbumMedia>) -> Vec<String> {
    let mut lines = Vec::new();
    let sections: [(&str, Vec<&Album>); 3] = [
        ("Albums", gallery.top_albums()),
        ("Hidden", gallery.top_hidden_albums()),
        (
            "Unattached",
            gallery
                .albums()
                .into_iter()
                .filter(|a| a.parent.as_ref().is_some_and(|p| gallery.album(p).is_none()))
                .collect(),
        ),
    ];
    for (heading, albums) in sections {
        if albums.is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(heading.to_string());
        for (i, album) in albums.into_iter().enumerate() {
            album_lines(gallery, album, i + 1, 0, media, &mut lines);
        }
    }
    lines
}

pub fn print_check(gallery: &Gallery, media: &HashMap<String, AlbumMedia>) {
    for line in format_check(gallery, media) {
        println!("{}", line);
    }
}

// ============================================================================
// Files
// ============================================================================

/// Every file under `target`, as sorted `/`-separated relative paths.
///
/// Hidden entries (such as in-progress writes) are left out.
pub fn list_output_files(target: &Path) -> Result<Vec<String>, walkdir::Error> {
    let mut files = Vec::new();
    let walker = WalkDir::new(target)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(target) {
            files.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    files.sort();
    Ok(files)
}

pub fn print_files(files: &[String]) {
    for file in files {
        println!("{}", file);
    }
}
