//! Read-only view objects for page rendering.
//!
//! `build` writes `<target>/gallery.json`, a self-contained description of
//! everything a templating step needs: albums with their tree links, and for
//! every image the URI and pixel size of each variant. Nothing in it points
//! back at the source tree except the `source` names, which are relative to
//! the album folder.

use crate::config::GalleryConfig;
use crate::gallery::{Album, Gallery};
use crate::imaging::{ResizeOption, plan_resize};
use crate::media::{Image, Video};
use crate::process::ProcessedAlbum;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// File name of the view document inside the target directory.
pub const VIEW_FILENAME: &str = "gallery.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryView {
    pub title: String,
    pub description: String,
    pub years: Vec<YearView>,
    /// Every album, newest first.
    pub albums: Vec<AlbumView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearView {
    pub year: i32,
    /// Top album ids, newest first.
    pub albums: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumView {
    pub id: String,
    pub uri: String,
    pub parent: Option<String>,
    /// Child ids, oldest first.
    pub children: Vec<String>,
    pub title: String,
    pub description: String,
    pub date: String,
    pub year: i32,
    pub tags: Vec<String>,
    pub hidden: bool,
    pub top: bool,
    pub thumbnail: Option<ImageView>,
    pub images: Vec<ImageView>,
    pub videos: Vec<VideoView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageView {
    pub source: String,
    pub date: Option<NaiveDateTime>,
    pub summary: String,
    pub variants: BTreeMap<String, VariantView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantView {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoView {
    pub source: String,
    pub date: Option<NaiveDateTime>,
    pub uri: String,
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn image_view(
    image: &Image,
    album: &Album,
    options: &[ResizeOption],
    dimensions: &HashMap<PathBuf, (u32, u32)>,
) -> ImageView {
    let source_dims = dimensions.get(&image.path).copied();
    let variants = options
        .iter()
        .map(|option| {
            let size = source_dims.map(|dims| {
                plan_resize(dims, option, image.orientation).output_dimensions(dims)
            });
            (
                option.name().to_string(),
                VariantView {
                    uri: image.uri(&album.id, option),
                    width: size.map(|s| s.0),
                    height: size.map(|s| s.1),
                },
            )
        })
        .collect();
    ImageView {
        source: relative(&image.path, album.images.root()),
        date: image.date,
        summary: image.summary.clone(),
        variants,
    }
}

fn video_view(video: &Video, album: &Album) -> VideoView {
    VideoView {
        source: relative(&video.path, album.videos.root()),
        date: video.date,
        uri: video.uri(&album.id),
    }
}

fn album_view(
    gallery: &Gallery,
    album: &Album,
    processed: Option<&ProcessedAlbum>,
    options: &[ResizeOption],
) -> AlbumView {
    let empty = HashMap::new();
    let dimensions = processed.map(|p| &p.dimensions).unwrap_or(&empty);
    let (thumbnail, images, videos) = match processed {
        Some(p) => (
            p.media
                .thumbnail
                .as_ref()
                .map(|t| image_view(t, album, options, dimensions)),
            p.media
                .images
                .iter()
                .map(|i| image_view(i, album, options, dimensions))
                .collect(),
            p.media.videos.iter().map(|v| video_view(v, album)).collect(),
        ),
        None => (None, Vec::new(), Vec::new()),
    };
    AlbumView {
        id: album.id.clone(),
        uri: album.uri(),
        parent: album.parent.clone(),
        children: gallery
            .children(album)
            .iter()
            .map(|c| c.id.clone())
            .collect(),
        title: album.title.clone(),
        description: album.description.clone(),
        date: album.date.format("%Y-%m-%d").to_string(),
        year: album.year(),
        tags: album.tags.iter().cloned().collect(),
        hidden: album.hidden,
        top: album.is_top(),
        thumbnail,
        images,
        videos,
    }
}

/// Assemble the view of a processed gallery.
pub fn gallery_view(
    config: &GalleryConfig,
    gallery: &Gallery,
    processed: &[ProcessedAlbum],
    options: &[ResizeOption],
) -> GalleryView {
    let by_id: HashMap<&str, &ProcessedAlbum> =
        processed.iter().map(|p| (p.id.as_str(), p)).collect();
    GalleryView {
        title: config.gallery.title.clone(),
        description: config.gallery.description.clone(),
        years: gallery
            .top_years()
            .into_iter()
            .map(|year| YearView {
                year,
                albums: gallery
                    .top_albums_in(year)
                    .iter()
                    .map(|a| a.id.clone())
                    .collect(),
            })
            .collect(),
        albums: gallery
            .albums()
            .into_iter()
            .map(|album| album_view(gallery, album, by_id.get(album.id.as_str()).copied(), options))
            .collect(),
    }
}

/// Write `view` to `<target>/gallery.json`.
pub fn write_gallery_view(target: &Path, view: &GalleryView) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(target)?;
    let path = target.join(VIEW_FILENAME);
    std::fs::write(&path, serde_json::to_string_pretty(view)?)?;
    Ok(path)
}
