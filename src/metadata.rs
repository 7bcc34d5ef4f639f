//! Capture metadata extraction.
//!
//! The build needs three facts about every media file, none of which can be
//! derived from the path:
//!
//! - **Capture date**: when the photo or clip was taken. Drives the default
//!   ordering of album pages.
//! - **Orientation**: the counter-clockwise rotation that makes the pixels
//!   upright. Applied when rendering variants and part of their names.
//! - **Summary**: a one-line camera/exposure caption, e.g.
//!   `Fujifilm X-T3  XF35mmF1.4 R | ISO200  f/2.8  1/250s | DSCF0042`.
//!
//! ## Extractors
//!
//! | Extractor | Source | Notes |
//! |---|---|---|
//! | [`ExifExtractor`] | `kamadak-exif`, in process | JPEG, TIFF, HEIF, PNG, WebP; files without EXIF get defaults |
//! | [`ExiftoolExtractor`] | `exiftool -groupNames -json -quiet` | Also reads QuickTime dates from videos; needs the program installed |
//!
//! Extraction failures are fatal for the media set being loaded: there is no
//! retry, and a half-extracted set is never cached.
//!
//! [`MemoizedExtractor`] wraps either one with a bounded FIFO cache keyed by
//! the exact path list, so asking twice for the same set during one process
//! runs the extractor once.

use crate::imaging::Orientation;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// EXIF date format: `2019:07:14 10:11:12`.
const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("cannot read metadata from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("malformed {program} output: {source}")]
    Malformed {
        program: String,
        source: serde_json::Error,
    },
    #[error("no metadata returned for {}", .0.display())]
    Missing(PathBuf),
}

/// What the build knows about a file beyond its bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub capture_date: Option<NaiveDateTime>,
    pub orientation: Orientation,
    pub summary: String,
}

/// Anything that can describe a batch of files.
///
/// Implementations return one entry per input path, in input order.
pub trait MetadataExtractor: Sync {
    fn extract(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, MediaMetadata)>, MetadataError>;
}

impl<E: MetadataExtractor + ?Sized> MetadataExtractor for Box<E> {
    fn extract(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, MediaMetadata)>, MetadataError> {
        (**self).extract(paths)
    }
}

impl<E: MetadataExtractor + ?Sized> MetadataExtractor for &E {
    fn extract(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, MediaMetadata)>, MetadataError> {
        (**self).extract(paths)
    }
}

// =========================================================================
// Summary line
// =========================================================================

/// Raw camera facts a summary is built from. Empty strings mean unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraInfo {
    pub make: String,
    pub model: String,
    pub lens: String,
    pub iso: String,
    pub fnumber: String,
    pub exposure: String,
    /// Film simulation or picture style, when the camera records one.
    pub style: String,
    pub file_stem: String,
}

/// `"Canon"` stays, `"FUJIFILM"` → `"Fujifilm"`, `"NIKON CORPORATION"` → `"Nikon corporation"`.
fn capitalize(value: &str) -> String {
    let mut chars = value.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

impl CameraInfo {
    /// `Make Model  Lens | ISO<iso>  f/<f>  <t>s | style | stem`; unknown
    /// fields and empty groups are left out.
    pub fn summary(&self) -> String {
        let make = capitalize(&self.make);
        let model = if make.is_empty() {
            self.model.trim().to_string()
        } else {
            self.model.replace(&make, "").trim().to_string()
        };
        let body = [make, model]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let camera = [body, self.lens.trim().to_string()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("  ");

        let mut exposure = Vec::new();
        if !self.iso.is_empty() {
            exposure.push(format!("ISO{}", self.iso));
        }
        if !self.fnumber.is_empty() {
            exposure.push(format!("f/{}", self.fnumber));
        }
        if !self.exposure.is_empty() {
            exposure.push(format!("{}s", self.exposure));
        }

        [
            camera,
            exposure.join("  "),
            self.style.trim().to_string(),
            self.file_stem.clone(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// `1/250` for fast shutter speeds, plain seconds otherwise.
fn format_exposure(num: u32, denom: u32) -> String {
    if num == 0 || denom == 0 {
        return String::new();
    }
    let seconds = num as f64 / denom as f64;
    if seconds < 0.25 {
        format!("1/{}", (denom as f64 / num as f64).round() as u64)
    } else {
        trim_float(seconds)
    }
}

fn trim_float(value: f64) -> String {
    let text = format!("{value:.1}");
    text.strip_suffix(".0").map(str::to_string).unwrap_or(text)
}

// =========================================================================
// EXIF (in process)
// =========================================================================

/// Reads EXIF directly with `kamadak-exif`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifExtractor;

impl ExifExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_one(&self, path: &Path) -> Result<MediaMetadata, MetadataError> {
        let io_err = |source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let mut reader = BufReader::new(file);
        let exif = match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(exif::Error::Io(e)) => return Err(io_err(e)),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no usable EXIF");
                return Ok(MediaMetadata {
                    summary: file_stem(path),
                    ..MediaMetadata::default()
                });
            }
        };
        Ok(metadata_from_exif(&exif, path))
    }
}

fn exif_ascii(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    match &exif.get_field(tag, exif::In::PRIMARY)?.value {
        exif::Value::Ascii(values) => {
            let first = values.first()?;
            let text = String::from_utf8_lossy(first)
                .trim_matches(char::from(0))
                .trim()
                .to_string();
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

fn exif_rational(exif: &exif::Exif, tag: exif::Tag) -> Option<exif::Rational> {
    match &exif.get_field(tag, exif::In::PRIMARY)?.value {
        exif::Value::Rational(values) => values.first().copied(),
        _ => None,
    }
}

fn metadata_from_exif(exif: &exif::Exif, path: &Path) -> MediaMetadata {
    let capture_date = [exif::Tag::DateTimeOriginal, exif::Tag::DateTime]
        .into_iter()
        .filter_map(|tag| exif_ascii(exif, tag))
        .find_map(|s| NaiveDateTime::parse_from_str(&s, EXIF_DATE_FORMAT).ok());
    let orientation = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .map(Orientation::from_exif)
        .unwrap_or_default();

    let info = CameraInfo {
        make: exif_ascii(exif, exif::Tag::Make).unwrap_or_default(),
        model: exif_ascii(exif, exif::Tag::Model).unwrap_or_default(),
        lens: exif_ascii(exif, exif::Tag::LensModel).unwrap_or_default(),
        iso: exif
            .get_field(exif::Tag::PhotographicSensitivity, exif::In::PRIMARY)
            .and_then(|f| f.value.get_uint(0))
            .map(|v| v.to_string())
            .unwrap_or_default(),
        fnumber: exif_rational(exif, exif::Tag::FNumber)
            .filter(|r| r.denom != 0)
            .map(|r| format!("{:.1}", r.to_f64()))
            .unwrap_or_default(),
        exposure: exif_rational(exif, exif::Tag::ExposureTime)
            .map(|r| format_exposure(r.num, r.denom))
            .unwrap_or_default(),
        style: String::new(),
        file_stem: file_stem(path),
    };

    MediaMetadata {
        capture_date,
        orientation,
        summary: info.summary(),
    }
}

impl MetadataExtractor for ExifExtractor {
    fn extract(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, MediaMetadata)>, MetadataError> {
        paths
            .iter()
            .map(|p| Ok((p.clone(), self.extract_one(p)?)))
            .collect()
    }
}

// =========================================================================
// exiftool (subprocess)
// =========================================================================

/// Runs `exiftool` once per batch and parses its grouped JSON output.
#[derive(Debug, Clone)]
pub struct ExiftoolExtractor {
    program: String,
}

impl Default for ExiftoolExtractor {
    fn default() -> Self {
        Self::new("exiftool")
    }
}

impl ExiftoolExtractor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

fn json_text(entry: &serde_json::Map<String, serde_json::Value>, key: &str) -> String {
    match entry.get(key) {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// exiftool's printed orientation names.
fn orientation_from_name(value: &str) -> Orientation {
    match value {
        "Rotate 180" => Orientation::Ccw180,
        "Rotate 90 CW" => Orientation::Ccw270,
        "Rotate 270 CW" => Orientation::Ccw90,
        _ => Orientation::Upright,
    }
}

/// `"Classic Chrome (Classic Chrome)"`-style maker note → inner word.
fn style_from_film_mode(value: &str) -> String {
    value
        .split_once('(')
        .and_then(|(_, rest)| rest.split_once(')'))
        .map(|(inner, _)| inner.trim().to_string())
        .unwrap_or_default()
}

fn metadata_from_exiftool(entry: &serde_json::Map<String, serde_json::Value>) -> MediaMetadata {
    let capture_date = {
        let exif = json_text(entry, "EXIF:DateTimeOriginal");
        let quicktime = json_text(entry, "QuickTime:DateTimeOriginal");
        NaiveDateTime::parse_from_str(&exif, EXIF_DATE_FORMAT)
            .ok()
            .or_else(|| {
                chrono::DateTime::parse_from_str(&quicktime, "%Y:%m:%d %H:%M:%S%:z")
                    .map(|dt| dt.naive_local())
                    .ok()
            })
            .or_else(|| NaiveDateTime::parse_from_str(&quicktime, EXIF_DATE_FORMAT).ok())
    };
    let orientation = match entry.get("EXIF:Orientation") {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .map(|v| Orientation::from_exif(v as u32))
            .unwrap_or_default(),
        _ => orientation_from_name(&json_text(entry, "EXIF:Orientation")),
    };
    let file_name = json_text(entry, "File:FileName");
    let info = CameraInfo {
        make: json_text(entry, "EXIF:Make"),
        model: json_text(entry, "EXIF:Model"),
        lens: json_text(entry, "EXIF:LensModel"),
        iso: json_text(entry, "EXIF:ISO"),
        fnumber: json_text(entry, "EXIF:FNumber"),
        exposure: json_text(entry, "EXIF:ExposureTime"),
        style: style_from_film_mode(&json_text(entry, "MakerNotes:FilmMode")),
        file_stem: file_stem(Path::new(&file_name)),
    };
    MediaMetadata {
        capture_date,
        orientation,
        summary: info.summary(),
    }
}

/// Parse `exiftool -groupNames -json` output into metadata keyed by `SourceFile`.
pub fn parse_exiftool_json(
    program: &str,
    output: &[u8],
) -> Result<HashMap<String, MediaMetadata>, MetadataError> {
    let entries: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_slice(output)
        .map_err(|source| MetadataError::Malformed {
        program: program.to_string(),
        source,
    })?;
    Ok(entries
        .iter()
        .map(|entry| (json_text(entry, "SourceFile"), metadata_from_exiftool(entry)))
        .collect())
}

impl MetadataExtractor for ExiftoolExtractor {
    fn extract(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, MediaMetadata)>, MetadataError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(program = %self.program, files = paths.len(), "running metadata extractor");
        let output = Command::new(&self.program)
            .args(["-groupNames", "-json", "-quiet"])
            .args(paths)
            .output()
            .map_err(|source| MetadataError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(MetadataError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let mut by_source = parse_exiftool_json(&self.program, &output.stdout)?;
        paths
            .iter()
            .map(|p| {
                by_source
                    .remove(p.to_string_lossy().as_ref())
                    .map(|m| (p.clone(), m))
                    .ok_or_else(|| MetadataError::Missing(p.clone()))
            })
            .collect()
    }
}

// =========================================================================
// Memoization
// =========================================================================

type Batch = Arc<Vec<(PathBuf, MediaMetadata)>>;

#[derive(Default)]
struct Memo {
    entries: HashMap<Vec<PathBuf>, Batch>,
    order: VecDeque<Vec<PathBuf>>,
}

/// Bounded FIFO cache in front of another extractor.
///
/// The key is the exact path list, order included. Only successful results
/// are remembered. Memory is released when the wrapper is dropped.
pub struct MemoizedExtractor<E> {
    inner: E,
    capacity: usize,
    memo: Mutex<Memo>,
}

impl<E: MetadataExtractor> MemoizedExtractor<E> {
    /// `capacity` is clamped to at least one entry.
    pub fn new(inner: E, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            memo: Mutex::new(Memo::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.memo.lock().map(|m| m.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &[PathBuf]) -> Option<Batch> {
        let memo = self.memo.lock().ok()?;
        memo.entries.get(key).cloned()
    }

    fn remember(&self, key: Vec<PathBuf>, batch: Batch) {
        let Ok(mut memo) = self.memo.lock() else {
            return;
        };
        if memo.entries.contains_key(&key) {
            return;
        }
        while memo.order.len() >= self.capacity {
            match memo.order.pop_front() {
                Some(oldest) => {
                    memo.entries.remove(&oldest);
                }
                None => break,
            }
        }
        memo.order.push_back(key.clone());
        memo.entries.insert(key, batch);
    }
}

impl<E: MetadataExtractor> MetadataExtractor for MemoizedExtractor<E> {
    fn extract(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, MediaMetadata)>, MetadataError> {
        if let Some(hit) = self.lookup(paths) {
            tracing::debug!(files = paths.len(), "metadata memo hit");
            return Ok(hit.as_ref().clone());
        }
        let batch = self.inner.extract(paths)?;
        self.remember(paths.to_vec(), Arc::new(batch.clone()));
        Ok(batch)
    }
}
