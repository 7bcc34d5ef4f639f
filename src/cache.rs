//! Per-album metadata cache for incremental builds.
//!
//! Extracting capture metadata and hashing file contents are the expensive
//! part of loading an album: every file must be read in full. This module
//! lets a build reuse the items computed last time when the files have not
//! changed.
//!
//! # Design
//!
//! Each album descriptor gets a side-car JSON file next to it, named after
//! the descriptor with the extension swapped for `cache.json`:
//!
//! ```text
//! 2019-07-14 - Lake/
//! ├── behappy.toml
//! ├── behappy.cache.json          ← side-car for behappy.toml
//! ├── behappy.night.toml
//! └── behappy.night.cache.json    ← side-car for behappy.night.toml
//! ```
//!
//! The document holds one item list per media kind:
//!
//! ```json
//! { "version": 1, "images": [ ... ], "videos": [ ... ] }
//! ```
//!
//! ## Validity
//!
//! A cached list is trusted only when the **stamps** of the files the media
//! set resolves to right now are exactly the stamps recorded in the list,
//! compared as sorted lists. Any difference (a file added, removed, touched
//! or replaced) discards the whole list and every file is extracted again.
//! Stamps are stat-only (see [`identity`](crate::identity)), so checking
//! validity never reads file content.
//!
//! ## Robustness
//!
//! The side-car is optional. A missing file, unreadable JSON, a different
//! `version`, or a list that no longer deserializes all behave like an
//! empty cache. Nothing here is ever fatal for the build.
//!
//! ## Bypassing the cache
//!
//! `--no-cache` opens every side-car as empty. Freshly extracted lists are
//! still saved, so the next build is warm again.

use crate::identity::{Stamp, stamp_of, stamps_match};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Version of the side-car format. Bump to invalidate every side-car.
pub const CACHE_VERSION: u32 = 1;

/// Extension replacing the descriptor's own.
const SIDE_CAR_EXTENSION: &str = "cache.json";

/// An item that can be stored in a side-car list.
pub trait Cacheable: Serialize + DeserializeOwned {
    /// Key of the list in the side-car (`"images"`, `"videos"`).
    const KEY: &'static str;
    /// Item schema version mixed into stamps; bumping it invalidates old lists.
    const VERSION: u32;

    fn stamp(&self) -> &Stamp;
}

/// Side-car path for a descriptor file.
pub fn side_car_path(descriptor: &Path) -> PathBuf {
    descriptor.with_extension(SIDE_CAR_EXTENSION)
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Document {
    version: u32,
    #[serde(flatten)]
    lists: BTreeMap<String, serde_json::Value>,
}

impl Document {
    fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            lists: BTreeMap::new(),
        }
    }
}

/// How a side-car file looked when it was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideCarState {
    Loaded,
    Missing,
    Corrupt,
    OldVersion,
    Disabled,
}

/// Result of looking up one list.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOutcome<T> {
    /// Stamps matched; items are ready to use.
    Hit(Vec<T>),
    /// Nothing usable was stored for this key.
    Empty,
    /// A list exists but the files changed since it was written.
    Stale,
}

impl<T> CacheOutcome<T> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hit(_) => "hit",
            Self::Empty => "empty",
            Self::Stale => "stale",
        }
    }
}

/// The side-car of one album, loaded into memory.
#[derive(Debug, Clone)]
pub struct AlbumCache {
    path: PathBuf,
    state: SideCarState,
    document: Document,
}

impl AlbumCache {
    /// Load the side-car of `descriptor`. Never fails: anything unusable
    /// yields an empty cache.
    pub fn open(descriptor: &Path) -> Self {
        let path = side_car_path(descriptor);
        let (state, document) = match std::fs::read(&path) {
            Err(_) => (SideCarState::Missing, Document::empty()),
            Ok(bytes) => match serde_json::from_slice::<Document>(&bytes) {
                Err(_) => (SideCarState::Corrupt, Document::empty()),
                Ok(doc) if doc.version != CACHE_VERSION => {
                    (SideCarState::OldVersion, Document::empty())
                }
                Ok(doc) => (SideCarState::Loaded, doc),
            },
        };
        tracing::debug!(side_car = %path.display(), ?state, "opened metadata cache");
        Self {
            path,
            state,
            document,
        }
    }

    /// An empty cache for `descriptor` that still saves to its side-car.
    pub fn disabled(descriptor: &Path) -> Self {
        Self {
            path: side_car_path(descriptor),
            state: SideCarState::Disabled,
            document: Document::empty(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> SideCarState {
        self.state
    }

    /// Return the stored list for `T` if it describes exactly `current`.
    pub fn load<T: Cacheable>(&self, current: &BTreeSet<PathBuf>) -> CacheOutcome<T> {
        let Some(value) = self.document.lists.get(T::KEY) else {
            return CacheOutcome::Empty;
        };
        let items: Vec<T> = match serde_json::from_value(value.clone()) {
            Ok(items) => items,
            Err(e) => {
                tracing::debug!(
                    side_car = %self.path.display(),
                    key = T::KEY,
                    error = %e,
                    "unreadable cached list"
                );
                return CacheOutcome::Empty;
            }
        };
        if items.is_empty() {
            return CacheOutcome::Empty;
        }

        let current_stamps: Option<Vec<Stamp>> = current
            .iter()
            .map(|p| stamp_of(T::VERSION, p).ok())
            .collect();
        let Some(current_stamps) = current_stamps else {
            return CacheOutcome::Stale;
        };
        let recorded: Vec<Stamp> = items.iter().map(|i| i.stamp().clone()).collect();

        if stamps_match(&current_stamps, &recorded) {
            CacheOutcome::Hit(items)
        } else {
            CacheOutcome::Stale
        }
    }

    /// Replace the list for `T` and write the side-car, keeping other lists.
    pub fn save<T: Cacheable>(&mut self, items: &[T]) -> io::Result<()> {
        let value = serde_json::to_value(items)?;
        self.document.lists.insert(T::KEY.to_string(), value);
        let json = serde_json::to_string_pretty(&self.document)?;
        std::fs::write(&self.path, json)
    }
}

/// Per-build tally of cache lookups.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub empty: u32,
    pub stale: u32,
}

impl CacheStats {
    pub fn record<T>(&mut self, outcome: &CacheOutcome<T>) {
        match outcome {
            CacheOutcome::Hit(_) => self.hits += 1,
            CacheOutcome::Empty => self.empty += 1,
            CacheOutcome::Stale => self.stale += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.hits + self.empty + self.stale
    }

    pub fn merge(&mut self, other: CacheStats) {
        self.hits += other.hits;
        self.empty += other.empty;
        self.stale += other.stale;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} reused, {} stale, {} empty ({} lists)",
                self.hits,
                self.stale,
                self.empty,
                self.total()
            )
        } else {
            write!(f, "{} lists extracted", self.total())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Item {
        path: PathBuf,
        stamp: Stamp,
    }

    impl Cacheable for Item {
        const KEY: &'static str = "images";
        const VERSION: u32 = 1;

        fn stamp(&self) -> &Stamp {
            &self.stamp
        }
    }

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Other {
        stamp: Stamp,
    }

    impl Cacheable for Other {
        const KEY: &'static str = "videos";
        const VERSION: u32 = 1;

        fn stamp(&self) -> &Stamp {
            &self.stamp
        }
    }

    fn item(path: &Path) -> Item {
        Item {
            path: path.to_path_buf(),
            stamp: stamp_of(Item::VERSION, path).unwrap(),
        }
    }

    struct Album {
        _tmp: TempDir,
        descriptor: PathBuf,
        files: BTreeSet<PathBuf>,
    }

    fn album_with(names: &[&str]) -> Album {
        let tmp = TempDir::new().unwrap();
        let descriptor = tmp.path().join("behappy.toml");
        fs::write(&descriptor, "").unwrap();
        let files = names
            .iter()
            .map(|n| {
                let p = tmp.path().join(n);
                fs::write(&p, n.as_bytes()).unwrap();
                p
            })
            .collect();
        Album {
            _tmp: tmp,
            descriptor,
            files,
        }
    }

    fn items(files: &BTreeSet<PathBuf>) -> Vec<Item> {
        files.iter().map(|p| item(p)).collect()
    }

    // =========================================================================
    // Side-car location and state
    // =========================================================================

    #[test]
    fn side_car_next_to_descriptor() {
        assert_eq!(
            side_car_path(Path::new("/a/behappy.toml")),
            PathBuf::from("/a/behappy.cache.json")
        );
        assert_eq!(
            side_car_path(Path::new("/a/behappy.night.toml")),
            PathBuf::from("/a/behappy.night.cache.json")
        );
    }

    #[test]
    fn missing_side_car_is_empty() {
        let album = album_with(&["a.jpg"]);
        let cache = AlbumCache::open(&album.descriptor);
        assert_eq!(cache.state(), SideCarState::Missing);
        assert_eq!(cache.load::<Item>(&album.files), CacheOutcome::Empty);
    }

    #[test]
    fn corrupt_side_car_is_empty() {
        let album = album_with(&["a.jpg"]);
        fs::write(side_car_path(&album.descriptor), "{not json").unwrap();

        let cache = AlbumCache::open(&album.descriptor);
        assert_eq!(cache.state(), SideCarState::Corrupt);
        assert_eq!(cache.load::<Item>(&album.files), CacheOutcome::Empty);
    }

    #[test]
    fn old_version_is_empty() {
        let album = album_with(&["a.jpg"]);
        let mut cache = AlbumCache::open(&album.descriptor);
        cache.save(&items(&album.files)).unwrap();

        let path = side_car_path(&album.descriptor);
        let mut doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        doc["version"] = serde_json::json!(CACHE_VERSION + 1);
        fs::write(&path, doc.to_string()).unwrap();

        let cache = AlbumCache::open(&album.descriptor);
        assert_eq!(cache.state(), SideCarState::OldVersion);
        assert_eq!(cache.load::<Item>(&album.files), CacheOutcome::Empty);
    }

    // =========================================================================
    // Validity
    // =========================================================================

    #[test]
    fn unchanged_files_hit() {
        let album = album_with(&["a.jpg", "b.jpg"]);
        let saved = items(&album.files);
        AlbumCache::open(&album.descriptor).save(&saved).unwrap();

        let cache = AlbumCache::open(&album.descriptor);
        assert_eq!(cache.load::<Item>(&album.files), CacheOutcome::Hit(saved));
    }

    #[test]
    fn added_file_invalidates_whole_list() {
        let mut album = album_with(&["a.jpg", "b.jpg"]);
        AlbumCache::open(&album.descriptor)
            .save(&items(&album.files))
            .unwrap();

        let extra = album.descriptor.with_file_name("c.jpg");
        fs::write(&extra, b"new").unwrap();
        album.files.insert(extra);

        let cache = AlbumCache::open(&album.descriptor);
        assert_eq!(cache.load::<Item>(&album.files), CacheOutcome::Stale);
    }

    #[test]
    fn removed_file_invalidates() {
        let mut album = album_with(&["a.jpg", "b.jpg"]);
        AlbumCache::open(&album.descriptor)
            .save(&items(&album.files))
            .unwrap();

        let first = album.files.iter().next().cloned().unwrap();
        album.files.remove(&first);

        let cache = AlbumCache::open(&album.descriptor);
        assert_eq!(cache.load::<Item>(&album.files), CacheOutcome::Stale);
    }

    #[test]
    fn modified_file_invalidates() {
        let album = album_with(&["a.jpg"]);
        AlbumCache::open(&album.descriptor)
            .save(&items(&album.files))
            .unwrap();

        let file = album.files.iter().next().unwrap();
        fs::write(file, b"different length content").unwrap();

        let cache = AlbumCache::open(&album.descriptor);
        assert_eq!(cache.load::<Item>(&album.files), CacheOutcome::Stale);
    }

    #[test]
    fn vanished_file_is_stale_not_error() {
        let album = album_with(&["a.jpg"]);
        AlbumCache::open(&album.descriptor)
            .save(&items(&album.files))
            .unwrap();
        let mut current = album.files.clone();
        current.insert(album.descriptor.with_file_name("ghost.jpg"));

        let cache = AlbumCache::open(&album.descriptor);
        assert_eq!(cache.load::<Item>(&current), CacheOutcome::Stale);
    }

    #[test]
    fn disabled_cache_ignores_side_car_but_saves() {
        let album = album_with(&["a.jpg"]);
        AlbumCache::open(&album.descriptor)
            .save(&items(&album.files))
            .unwrap();

        let mut cache = AlbumCache::disabled(&album.descriptor);
        assert_eq!(cache.load::<Item>(&album.files), CacheOutcome::Empty);
        cache.save(&items(&album.files)).unwrap();

        let reopened = AlbumCache::open(&album.descriptor);
        assert!(matches!(
            reopened.load::<Item>(&album.files),
            CacheOutcome::Hit(_)
        ));
    }

    // =========================================================================
    // Keys share one side-car
    // =========================================================================

    #[test]
    fn saving_one_key_keeps_the_other() {
        let album = album_with(&["a.jpg", "clip.mp4"]);
        let mut cache = AlbumCache::open(&album.descriptor);
        cache.save(&items(&album.files)).unwrap();

        let mut cache = AlbumCache::open(&album.descriptor);
        let video = Other {
            stamp: Stamp::from("v".to_string()),
        };
        cache.save(&[video]).unwrap();

        let raw: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(side_car_path(&album.descriptor)).unwrap(),
        )
        .unwrap();
        assert_eq!(raw["version"], CACHE_VERSION);
        assert_eq!(raw["images"].as_array().unwrap().len(), 2);
        assert_eq!(raw["videos"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn wrong_shape_list_is_empty() {
        let album = album_with(&["a.jpg"]);
        fs::write(
            side_car_path(&album.descriptor),
            r#"{"version": 1, "images": [{"unexpected": true}]}"#,
        )
        .unwrap();

        let cache = AlbumCache::open(&album.descriptor);
        assert_eq!(cache.state(), SideCarState::Loaded);
        assert_eq!(cache.load::<Item>(&album.files), CacheOutcome::Empty);
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn stats_display() {
        let mut stats = CacheStats::default();
        assert_eq!(stats.to_string(), "0 lists extracted");
        stats.record(&CacheOutcome::<Item>::Hit(Vec::new()));
        stats.record(&CacheOutcome::<Item>::Stale);
        assert_eq!(stats.to_string(), "1 reused, 1 stale, 0 empty (2 lists)");
    }
}
