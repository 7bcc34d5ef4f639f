//! Album descriptor files.
//!
//! Every album is declared by a small TOML file inside the folder holding its
//! media. A folder may declare several albums by using distinct file names:
//!
//! ```text
//! 2019-07-14 - Lake/
//! ├── behappy.toml          ← album "lake"
//! ├── behappy.night.toml    ← album "lake-night", same folder, other photos
//! ├── IMG_0001.jpg
//! └── ...
//! ```
//!
//! ## Format
//!
//! ```toml
//! [album]
//! id = "4b1c0e5e2d2f4f6c9d3f0b4a1e7c2d90"   # stable, unique across the gallery
//! parent = "trips-2019"                      # optional parent album id
//! title = "Lake"
//! description = ""
//! date = 2019-07-14                          # TOML date or "YYYY-MM-DD"
//! tags = ["family", "2019"]
//! hidden = false
//!
//! [images]
//! thumbnail = "IMG_0001.jpg"
//! include = ["*.jpg"]
//! exclude = ["IMG_0002.jpg"]
//! sortby = "date"                            # "date" or "path"
//!
//! [videos]
//! include = ["*.mp4"]
//! ```
//!
//! Files are parsed once into a typed [`Descriptor`] and validated eagerly:
//! a missing `id`, `title` or `date`, or a malformed date, fails the load and
//! names the offending file. A file with the right name but no `[album]`
//! table (such as the gallery config at a source root) is not a descriptor.

use crate::naming;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the default descriptor in a folder.
pub const DESCRIPTOR_FILENAME: &str = "behappy.toml";

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("cannot read descriptor {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed descriptor {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid descriptor {}: {message}", .path.display())]
    Invalid { path: PathBuf, message: String },
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("descriptor {} already exists", .0.display())]
    AlreadyExists(PathBuf),
    #[error("cannot write descriptor: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Key media items are ordered by on album pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Capture date, items without one first.
    #[default]
    Date,
    /// Source path.
    Path,
}

/// Which files of the album folder belong to one media set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaSpec {
    /// Designated cover image, relative to the folder.
    pub thumbnail: Option<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub sortby: SortBy,
}

/// A parsed and validated album descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// The descriptor file itself.
    pub path: PathBuf,
    pub id: String,
    pub parent: Option<String>,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub tags: BTreeSet<String>,
    pub hidden: bool,
    pub images: MediaSpec,
    pub videos: MediaSpec,
}

impl Descriptor {
    /// Folder the descriptor lives in; media patterns are relative to it.
    pub fn folder(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

// =========================================================================
// On-disk shape
// =========================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDescriptor {
    album: RawAlbum,
    #[serde(default)]
    images: Option<RawMedia>,
    #[serde(default)]
    videos: Option<RawMedia>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAlbum {
    id: String,
    #[serde(default)]
    parent: Option<String>,
    title: String,
    #[serde(default)]
    description: String,
    /// TOML date or a `YYYY-MM-DD` string; checked in [`RawAlbum::date`].
    date: toml::Value,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    hidden: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMedia {
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    sortby: SortBy,
}

impl RawAlbum {
    fn date(&self) -> Result<NaiveDate, String> {
        match &self.date {
            toml::Value::Datetime(dt) => match (dt.date, dt.time) {
                (Some(d), None) => {
                    NaiveDate::from_ymd_opt(d.year.into(), d.month.into(), d.day.into())
                        .ok_or_else(|| format!("date {dt} is not a calendar date"))
                }
                _ => Err(format!("date must be a plain date, got {dt}")),
            },
            toml::Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| format!("date must look like YYYY-MM-DD, got {s:?}")),
            other => Err(format!("date must be a date, got {}", other.type_str())),
        }
    }
}

impl From<RawMedia> for MediaSpec {
    fn from(raw: RawMedia) -> Self {
        let clean = |patterns: Vec<String>| -> Vec<String> {
            patterns
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        };
        Self {
            thumbnail: raw
                .thumbnail
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            include: clean(raw.include),
            exclude: clean(raw.exclude),
            sortby: raw.sortby,
        }
    }
}

/// Whether `file_name` is a descriptor candidate: `behappy.toml` or
/// `behappy.<name>.toml`.
pub fn is_descriptor_name(file_name: &str) -> bool {
    file_name == DESCRIPTOR_FILENAME
        || file_name
            .strip_prefix("behappy.")
            .and_then(|rest| rest.strip_suffix(".toml"))
            .is_some_and(|middle| !middle.is_empty())
}

/// Parse a descriptor file.
///
/// Returns `Ok(None)` for a well-formed TOML file without an `[album]`
/// table.
pub fn parse_descriptor(path: &Path) -> Result<Option<Descriptor>, DescriptorError> {
    let content = fs::read_to_string(path).map_err(|source| DescriptorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_descriptor_str(path, &content)
}

fn parse_descriptor_str(path: &Path, content: &str) -> Result<Option<Descriptor>, DescriptorError> {
    let parse_err = |source| DescriptorError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let table: toml::Table = toml::from_str(content).map_err(parse_err)?;
    if !table.contains_key("album") {
        return Ok(None);
    }
    let raw: RawDescriptor = toml::Value::Table(table).try_into().map_err(parse_err)?;

    let invalid = |message: String| DescriptorError::Invalid {
        path: path.to_path_buf(),
        message,
    };
    let id = raw.album.id.trim().to_string();
    if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(invalid(format!(
            "album id must be a non-empty single path segment, got {:?}",
            raw.album.id
        )));
    }
    let date = raw.album.date().map_err(invalid)?;

    Ok(Some(Descriptor {
        path: path.to_path_buf(),
        id,
        parent: raw
            .album
            .parent
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        title: raw.album.title,
        description: raw.album.description,
        date,
        tags: raw
            .album
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        hidden: raw.album.hidden,
        images: raw.images.map(MediaSpec::from).unwrap_or_default(),
        videos: raw.videos.map(MediaSpec::from).unwrap_or_default(),
    }))
}

// =========================================================================
// Scaffolding
// =========================================================================

#[derive(Serialize)]
struct NewDescriptor {
    album: NewAlbum,
    images: NewImages,
}

#[derive(Serialize)]
struct NewAlbum {
    id: String,
    title: String,
    description: String,
    date: toml::value::Datetime,
    tags: Vec<String>,
}

#[derive(Serialize)]
struct NewImages {
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<String>,
    include: Vec<String>,
    exclude: Vec<String>,
}

/// Render the starter descriptor for `folder` without writing it.
///
/// Title and date come from a `YYYY-MM-DD - Title` folder name; `today` is
/// used when the name carries no date. The first `*.jpg` (by name) becomes
/// the thumbnail.
pub fn render_scaffold(folder: &Path, today: NaiveDate) -> Result<String, DescriptorError> {
    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let parsed = naming::parse_folder_name(&name);
    let date = parsed.date.unwrap_or_else(|| {
        tracing::warn!(
            folder = %folder.display(),
            "cannot parse a date from the folder name, using today"
        );
        today
    });
    let date = date
        .format("%Y-%m-%d")
        .to_string()
        .parse::<toml::value::Datetime>()
        .map_err(|e| DescriptorError::Invalid {
            path: folder.to_path_buf(),
            message: e.to_string(),
        })?;

    let doc = NewDescriptor {
        album: NewAlbum {
            id: uuid::Uuid::new_v4().simple().to_string(),
            title: parsed.title,
            description: String::new(),
            date,
            tags: vec!["private".to_string()],
        },
        images: NewImages {
            thumbnail: first_jpeg(folder),
            include: vec!["*.jpg".to_string()],
            exclude: Vec::new(),
        },
    };
    Ok(toml::to_string(&doc)?)
}

/// Write a starter `behappy.toml` into `folder`. Never overwrites.
pub fn scaffold(folder: &Path, today: NaiveDate) -> Result<PathBuf, DescriptorError> {
    if !folder.is_dir() {
        return Err(DescriptorError::NotADirectory(folder.to_path_buf()));
    }
    let path = folder.join(DESCRIPTOR_FILENAME);
    if path.exists() {
        return Err(DescriptorError::AlreadyExists(path));
    }
    let content = render_scaffold(folder, today)?;
    fs::write(&path, content).map_err(|source| DescriptorError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn first_jpeg(folder: &Path) -> Option<String> {
    let mut names: Vec<String> = fs::read_dir(folder)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| !n.starts_with('.') && n.ends_with(".jpg"))
        .collect();
    names.sort();
    names.into_iter().next()
}
