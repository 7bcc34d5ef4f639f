//! Album index: descriptor discovery and the gallery model.
//!
//! Every descriptor file found under the configured source roots becomes one
//! [`Album`]. Albums are registered into a [`Gallery`], which owns them by id
//! and refuses duplicates. Parent links are resolved in a second pass once
//! every album is known, so a child may be discovered before its parent.
//!
//! ## Ordering
//!
//! - [`Gallery::albums`] and [`Gallery::top_albums`]: newest first.
//! - [`Gallery::children`]: oldest first, reading like a story.
//! - [`Gallery::top_years`]: newest year first, each year once.
//!
//! Ties on date are broken by id so every listing is deterministic.
//!
//! ## Tag filter
//!
//! An empty filter keeps every album. Otherwise an album is kept when it
//! shares at least one tag with the filter. Filtering happens at
//! registration, so a filtered-out parent simply leaves its children
//! unattached.

use crate::config::{ConfigError, GalleryConfig};
use crate::descriptor::{self, Descriptor, DescriptorError, SortBy};
use crate::media_set::{MediaSet, MediaSetError};
use chrono::{DateTime, Datelike, FixedOffset, NaiveTime};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error(
        "album id {id:?} ({title:?}) is declared twice:\n  {}\n  {}",
        .first.display(),
        .second.display()
    )]
    DuplicateId {
        id: String,
        title: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("cannot scan {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },
    #[error("date of {} is out of range", .0.display())]
    DateOutOfRange(PathBuf),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    MediaSet(#[from] MediaSetError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// One album, as declared by a descriptor.
#[derive(Debug, Clone)]
pub struct Album {
    pub id: String,
    pub parent: Option<String>,
    pub title: String,
    pub description: String,
    /// Midnight of the declared day in the gallery timezone.
    pub date: DateTime<FixedOffset>,
    pub tags: BTreeSet<String>,
    pub hidden: bool,
    /// The descriptor file this album was read from.
    pub source_path: PathBuf,
    pub images: MediaSet,
    pub videos: MediaSet,
    pub image_sort: SortBy,
    pub video_sort: SortBy,
    children: Vec<String>,
}

impl Album {
    pub fn from_descriptor(
        descriptor: Descriptor,
        timezone: FixedOffset,
    ) -> Result<Self, GalleryError> {
        let folder = descriptor.folder().to_path_buf();
        let date = descriptor
            .date
            .and_time(NaiveTime::MIN)
            .and_local_timezone(timezone)
            .single()
            .ok_or_else(|| GalleryError::DateOutOfRange(descriptor.path.clone()))?;
        Ok(Self {
            images: MediaSet::new(&folder, &descriptor.images)?,
            videos: MediaSet::new(&folder, &descriptor.videos)?,
            image_sort: descriptor.images.sortby,
            video_sort: descriptor.videos.sortby,
            id: descriptor.id,
            parent: descriptor.parent,
            title: descriptor.title,
            description: descriptor.description,
            date,
            tags: descriptor.tags,
            hidden: descriptor.hidden,
            source_path: descriptor.path,
            children: Vec::new(),
        })
    }

    /// Site-relative URI of the album page.
    pub fn uri(&self) -> String {
        format!("/album/{}/", self.id)
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// No parent and not hidden.
    pub fn is_top(&self) -> bool {
        self.parent.is_none() && !self.hidden
    }

    /// Ids of child albums, filled in by [`Gallery::link_children`].
    pub fn child_ids(&self) -> &[String] {
        &self.children
    }

    pub fn matches_tags(&self, filter: &BTreeSet<String>) -> bool {
        filter.is_empty() || !self.tags.is_disjoint(filter)
    }
}

/// All albums of a build, keyed by id.
#[derive(Debug, Default)]
pub struct Gallery {
    albums: BTreeMap<String, Album>,
}

fn newest_first(a: &&Album, b: &&Album) -> std::cmp::Ordering {
    b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id))
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an album. A second album with the same id is an error
    /// naming both descriptor files.
    pub fn add_album(&mut self, album: Album) -> Result<(), GalleryError> {
        if let Some(existing) = self.albums.get(&album.id) {
            return Err(GalleryError::DuplicateId {
                id: album.id.clone(),
                title: album.title.clone(),
                first: existing.source_path.clone(),
                second: album.source_path,
            });
        }
        self.albums.insert(album.id.clone(), album);
        Ok(())
    }

    /// Fill in every album's children. Runs once, after all albums are added.
    pub fn link_children(&mut self) {
        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for album in self.albums.values() {
            let Some(parent) = &album.parent else {
                continue;
            };
            if self.albums.contains_key(parent) {
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(album.id.clone());
            } else {
                tracing::debug!(album = %album.id, parent = %parent, "parent album not loaded");
            }
        }
        for album in self.albums.values_mut() {
            album.children = children.remove(&album.id).unwrap_or_default();
        }
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    pub fn album(&self, id: &str) -> Option<&Album> {
        self.albums.get(id)
    }

    /// Every album, newest first.
    pub fn albums(&self) -> Vec<&Album> {
        let mut albums: Vec<&Album> = self.albums.values().collect();
        albums.sort_by(newest_first);
        albums
    }

    /// Children of `album`, oldest first.
    pub fn children(&self, album: &Album) -> Vec<&Album> {
        let mut children: Vec<&Album> = album
            .children
            .iter()
            .filter_map(|id| self.albums.get(id))
            .collect();
        children.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        children
    }

    /// Albums without a parent that are not hidden, newest first.
    pub fn top_albums(&self) -> Vec<&Album> {
        self.albums().into_iter().filter(|a| a.is_top()).collect()
    }

    /// Albums without a parent that are hidden, newest first.
    pub fn top_hidden_albums(&self) -> Vec<&Album> {
        self.albums()
            .into_iter()
            .filter(|a| a.parent.is_none() && a.hidden)
            .collect()
    }

    /// Years that have at least one top album, newest first.
    pub fn top_years(&self) -> Vec<i32> {
        let years: BTreeSet<i32> = self.top_albums().iter().map(|a| a.year()).collect();
        years.into_iter().rev().collect()
    }

    /// Top albums of one year, newest first.
    pub fn top_albums_in(&self, year: i32) -> Vec<&Album> {
        self.top_albums()
            .into_iter()
            .filter(|a| a.year() == year)
            .collect()
    }
}

fn is_hidden_entry(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Every descriptor candidate under `root`, in path order.
pub fn discover_descriptors(root: &Path) -> Result<Vec<PathBuf>, GalleryError> {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden_entry(e));
    let mut found = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| GalleryError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file()
            && descriptor::is_descriptor_name(&entry.file_name().to_string_lossy())
        {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Discover, parse and link every album under the configured sources.
pub fn load_gallery(
    config: &GalleryConfig,
    tags: &BTreeSet<String>,
) -> Result<Gallery, GalleryError> {
    let timezone = config.timezone()?;
    let mut gallery = Gallery::new();
    for root in config.source_dirs() {
        for path in discover_descriptors(&root)? {
            let Some(descriptor) = descriptor::parse_descriptor(&path)? else {
                tracing::debug!(file = %path.display(), "no [album] table, skipping");
                continue;
            };
            let album = Album::from_descriptor(descriptor, timezone)?;
            if !album.matches_tags(tags) {
                tracing::debug!(album = %album.id, "filtered out by tags");
                continue;
            }
            gallery.add_album(album)?;
        }
    }
    gallery.link_children();
    Ok(gallery)
}
