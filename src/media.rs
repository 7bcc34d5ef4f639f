//! Image and video items and their derived artifacts.
//!
//! An item is everything the build knows about one source file: where it
//! is, when it was taken, how it must be rotated, a one-line camera summary,
//! its stamp and its content hash. Items are cheap to keep around and are
//! what the side-car cache stores.
//!
//! ## Artifact names
//!
//! Output file names are content addressed. For an image and a size variant
//! the name is the SHA-256 of
//!
//! ```text
//! [height, width, quality, crop, variant, content_hash]            (upright)
//! [height, width, quality, crop, variant, content_hash, "orientation", angle]
//! ```
//!
//! serialized as a JSON array. The same bytes rendered with the same option
//! always land on the same path, which is why an existing output can be
//! skipped without looking inside it.
//!
//! Videos are copied, not rendered: their name is the SHA-256 of the content
//! hash and the extension is the source's own.
//!
//! ## Loading
//!
//! [`load_album_media`] resolves an album's media sets and consults the
//! album side-car. When every stamp matches, the cached items are used as
//! they are. Otherwise the whole set is extracted and hashed again and the
//! side-car is rewritten.

use crate::cache::{AlbumCache, CacheOutcome, CacheStats, Cacheable};
use crate::descriptor::SortBy;
use crate::gallery::Album;
use crate::identity::{self, Stamp};
use crate::imaging::{Orientation, ResizeOption};
use crate::media_set::MediaSetError;
use crate::metadata::{MediaMetadata, MetadataError, MetadataExtractor};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory under an album's output folder that holds copied videos.
pub const VIDEO_DIR: &str = "video";

/// Extension used for videos whose source has none.
const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    MediaSet(#[from] MediaSetError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Output folder of an album: `<target>/album/<id>`.
pub fn album_dir(target: &Path, album_id: &str) -> PathBuf {
    target.join("album").join(album_id)
}

/// A media item that can be built from extracted metadata and cached.
pub trait MediaItem: Cacheable + Send + Sync {
    fn from_metadata(path: PathBuf, metadata: MediaMetadata) -> Result<Self, MediaError>
    where
        Self: Sized;

    fn path(&self) -> &Path;

    fn date(&self) -> Option<NaiveDateTime>;
}

fn read_err(path: &Path) -> impl FnOnce(std::io::Error) -> MediaError + '_ {
    move |source| MediaError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// =========================================================================
// Images
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub path: PathBuf,
    pub date: Option<NaiveDateTime>,
    pub orientation: Orientation,
    pub summary: String,
    pub stamp: Stamp,
    pub hash: String,
}

impl Image {
    /// Content-addressed file stem for this image rendered at `option`.
    pub fn artifact_name(&self, option: &ResizeOption) -> String {
        let mut key = serde_json::json!([
            option.height(),
            option.width(),
            option.quality().value(),
            option.crop(),
            option.name(),
            self.hash,
        ]);
        if self.orientation.needs_rotation() {
            if let Some(parts) = key.as_array_mut() {
                parts.push("orientation".into());
                parts.push(self.orientation.angle().into());
            }
        }
        identity::hash_str(&key.to_string())
    }

    /// Site-relative URI of the rendered variant.
    pub fn uri(&self, album_id: &str, option: &ResizeOption) -> String {
        format!(
            "/album/{album_id}/{}/{}.jpg",
            option.name(),
            self.artifact_name(option)
        )
    }

    /// Where the rendered variant lives under `target`.
    pub fn cache_path(&self, target: &Path, album_id: &str, option: &ResizeOption) -> PathBuf {
        album_dir(target, album_id)
            .join(option.name())
            .join(format!("{}.jpg", self.artifact_name(option)))
    }
}

impl Cacheable for Image {
    const KEY: &'static str = "images";
    const VERSION: u32 = 1;

    fn stamp(&self) -> &Stamp {
        &self.stamp
    }
}

impl MediaItem for Image {
    fn from_metadata(path: PathBuf, metadata: MediaMetadata) -> Result<Self, MediaError> {
        let stamp = identity::stamp_of(Self::VERSION, &path).map_err(read_err(&path))?;
        let hash = identity::hash_file(&path).map_err(read_err(&path))?;
        Ok(Self {
            date: metadata.capture_date,
            orientation: metadata.orientation,
            summary: metadata.summary,
            stamp,
            hash,
            path,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn date(&self) -> Option<NaiveDateTime> {
        self.date
    }
}

// =========================================================================
// Videos
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub path: PathBuf,
    pub date: Option<NaiveDateTime>,
    pub summary: String,
    pub stamp: Stamp,
    pub hash: String,
}

impl Video {
    pub fn artifact_name(&self) -> String {
        identity::hash_str(&self.hash)
    }

    /// Lowercased source extension, `mp4` when the source has none.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_VIDEO_EXTENSION.to_string())
    }

    fn file_name(&self) -> String {
        format!("{}.{}", self.artifact_name(), self.extension())
    }

    pub fn uri(&self, album_id: &str) -> String {
        format!("/album/{album_id}/{VIDEO_DIR}/{}", self.file_name())
    }

    pub fn cache_path(&self, target: &Path, album_id: &str) -> PathBuf {
        album_dir(target, album_id)
            .join(VIDEO_DIR)
            .join(self.file_name())
    }
}

impl Cacheable for Video {
    const KEY: &'static str = "videos";
    const VERSION: u32 = 1;

    fn stamp(&self) -> &Stamp {
        &self.stamp
    }
}

impl MediaItem for Video {
    fn from_metadata(path: PathBuf, metadata: MediaMetadata) -> Result<Self, MediaError> {
        let stamp = identity::stamp_of(Self::VERSION, &path).map_err(read_err(&path))?;
        let hash = identity::hash_file_streaming(&path).map_err(read_err(&path))?;
        Ok(Self {
            date: metadata.capture_date,
            summary: metadata.summary,
            stamp,
            hash,
            path,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn date(&self) -> Option<NaiveDateTime> {
        self.date
    }
}

/// Sort items in place. Items without a capture date come first.
pub fn sort_items<T: MediaItem>(items: &mut [T], sortby: SortBy) {
    match sortby {
        SortBy::Date => items.sort_by(|a, b| {
            a.date()
                .cmp(&b.date())
                .then_with(|| a.path().cmp(b.path()))
        }),
        SortBy::Path => items.sort_by(|a, b| a.path().cmp(b.path())),
    }
}

/// Extract metadata for `paths` and build items, hashing in parallel.
pub fn extract_items<T: MediaItem>(
    paths: &BTreeSet<PathBuf>,
    extractor: &dyn MetadataExtractor,
) -> Result<Vec<T>, MediaError> {
    if paths.is_empty() {
        return Ok(Vec::new());
    }
    let list: Vec<PathBuf> = paths.iter().cloned().collect();
    let mut extracted: HashMap<PathBuf, MediaMetadata> =
        extractor.extract(&list)?.into_iter().collect();
    let pairs = list
        .into_iter()
        .map(|path| match extracted.remove(&path) {
            Some(metadata) => Ok((path, metadata)),
            None => Err(MetadataError::Missing(path)),
        })
        .collect::<Result<Vec<_>, _>>()?;
    pairs
        .into_par_iter()
        .map(|(path, metadata)| T::from_metadata(path, metadata))
        .collect()
}

fn load_items<T: MediaItem>(
    cache: &mut AlbumCache,
    album_id: &str,
    paths: &BTreeSet<PathBuf>,
    sortby: SortBy,
    extractor: &dyn MetadataExtractor,
    stats: &mut CacheStats,
) -> Result<Vec<T>, MediaError> {
    let outcome = cache.load::<T>(paths);
    stats.record(&outcome);
    tracing::debug!(
        album = album_id,
        kind = T::KEY,
        outcome = outcome.label(),
        files = paths.len(),
        "metadata cache"
    );
    if let CacheOutcome::Hit(mut items) = outcome {
        sort_items(&mut items, sortby);
        return Ok(items);
    }

    let mut items = extract_items::<T>(paths, extractor)?;
    sort_items(&mut items, sortby);
    if let Err(e) = cache.save(&items) {
        tracing::warn!(
            album = album_id,
            side_car = %cache.path().display(),
            error = %e,
            "cannot write metadata cache"
        );
    }
    Ok(items)
}

/// Everything one album shows, with metadata.
#[derive(Debug, Clone, Default)]
pub struct AlbumMedia {
    /// The image listing, sorted by the album's image order.
    pub images: Vec<Image>,
    pub videos: Vec<Video>,
    /// The declared thumbnail, whether or not the listing includes it.
    pub thumbnail: Option<Image>,
    pub cache: CacheStats,
}

impl AlbumMedia {
    /// Images to render: the listing plus the thumbnail if it is not listed.
    pub fn images_for_resize(&self) -> Vec<&Image> {
        let mut images: Vec<&Image> = self.images.iter().collect();
        if let Some(thumbnail) = &self.thumbnail {
            if !self.images.iter().any(|i| i.path == thumbnail.path) {
                images.push(thumbnail);
            }
        }
        images
    }
}

/// Resolve and describe an album's media, reusing the side-car when valid.
///
/// With `no_cache` the side-car is ignored but still rewritten.
pub fn load_album_media(
    album: &Album,
    extractor: &dyn MetadataExtractor,
    no_cache: bool,
) -> Result<AlbumMedia, MediaError> {
    let mut cache = if no_cache {
        AlbumCache::disabled(&album.source_path)
    } else {
        AlbumCache::open(&album.source_path)
    };
    let mut stats = CacheStats::default();

    let image_paths = album.images.resolve()?;
    let video_paths = album.videos.resolve()?;
    let images: Vec<Image> = load_items(
        &mut cache,
        &album.id,
        &image_paths,
        album.image_sort,
        extractor,
        &mut stats,
    )?;
    let videos: Vec<Video> = load_items(
        &mut cache,
        &album.id,
        &video_paths,
        album.video_sort,
        extractor,
        &mut stats,
    )?;

    let thumbnail = match album.images.thumbnail()? {
        None => None,
        Some(path) => match images.iter().find(|i| i.path == path) {
            Some(listed) => Some(listed.clone()),
            None => extract_items::<Image>(&BTreeSet::from([path]), extractor)?
                .into_iter()
                .next(),
        },
    };

    Ok(AlbumMedia {
        images,
        videos,
        thumbnail,
        cache: stats,
    })
}
