//! Build orchestration: render every variant and copy every video.
//!
//! For each album the media listing is loaded (through the side-car cache),
//! then one task per *(image, variant)* pair is run on the global rayon
//! pool. Tasks share nothing but the filesystem and each writes its own
//! content-addressed file, so they need no coordination. Videos follow the
//! same shape with a plain copy instead of a render.
//!
//! ## Output Structure
//!
//! ```text
//! <target>/
//! └── album/
//!     └── <album id>/
//!         ├── thumb/<artifact>.jpg
//!         ├── small/<artifact>.jpg
//!         ├── big/<artifact>.jpg
//!         └── video/<artifact>.mp4
//! ```
//!
//! ## Failures
//!
//! A task that fails (corrupt image, unreadable file) is recorded as a
//! [`TaskFailure`] and the build moves on: sibling tasks and other albums
//! still produce their output. An album whose media cannot be loaded (a
//! metadata extraction failure, a missing thumbnail) is recorded as an
//! [`AlbumFailure`] and skipped; the other albums are still built.
//!
//! ## Progress
//!
//! When a sender is supplied, [`ProcessEvent`]s are emitted album by album
//! in listing order, after the album's tasks complete.

use crate::cache::CacheStats;
use crate::gallery::{Album, Gallery};
use crate::imaging::{self, ImageBackend, ResizeOption};
use crate::media::{self, AlbumMedia, Image, MediaError};
use crate::metadata::MetadataExtractor;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("album {album}: {source}")]
    Media {
        album: String,
        #[source]
        source: MediaError,
    },
}

/// What happened to one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStatus {
    /// Already on disk from an earlier build.
    Cached,
    Written,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantInfo {
    pub label: String,
    pub status: VariantStatus,
}

/// Progress events for CLI output.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    AlbumStarted {
        title: String,
        image_count: usize,
        video_count: usize,
    },
    ImageProcessed {
        /// 1-based position in the album's render list.
        index: usize,
        source_path: String,
        variants: Vec<VariantInfo>,
    },
    VideoCopied {
        index: usize,
        source_path: String,
        status: VariantStatus,
    },
    AlbumFinished(AlbumReport),
    AlbumFailed(AlbumFailure),
}

/// One failed render or copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub source: PathBuf,
    /// Variant name, or `video` for copies.
    pub variant: String,
    pub error: String,
}

/// An album skipped because its media could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumFailure {
    pub id: String,
    pub title: String,
    pub error: String,
}

/// Work done for one album.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumReport {
    pub id: String,
    pub title: String,
    pub resizes_written: usize,
    pub resizes_total: usize,
    pub videos_copied: usize,
    pub videos_total: usize,
    pub failures: Vec<TaskFailure>,
    pub cache: CacheStats,
}

/// Work done for the whole build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub albums: Vec<AlbumReport>,
    pub album_failures: Vec<AlbumFailure>,
}

impl BuildReport {
    /// Any failed task or skipped album.
    pub fn has_failures(&self) -> bool {
        !self.album_failures.is_empty() || self.albums.iter().any(|a| !a.failures.is_empty())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskFailure> {
        self.albums.iter().flat_map(|a| a.failures.iter())
    }

    pub fn resizes_written(&self) -> usize {
        self.albums.iter().map(|a| a.resizes_written).sum()
    }

    pub fn videos_copied(&self) -> usize {
        self.albums.iter().map(|a| a.videos_copied).sum()
    }

    pub fn cache(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for album in &self.albums {
            stats.merge(album.cache);
        }
        stats
    }
}

/// An album's media after processing, as needed to build view objects.
#[derive(Debug, Clone)]
pub struct ProcessedAlbum {
    pub id: String,
    pub media: AlbumMedia,
    /// Source dimensions of every image that could be identified.
    pub dimensions: HashMap<PathBuf, (u32, u32)>,
}

/// Everything `build` produces.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub report: BuildReport,
    pub albums: Vec<ProcessedAlbum>,
}

/// Build settings that stay fixed for a run.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub target: PathBuf,
    pub options: Vec<ResizeOption>,
    pub no_cache: bool,
}

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

fn send(progress: Option<&Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = progress {
        // Receiver gone means nobody is listening; the build carries on.
        let _ = tx.send(event);
    }
}

/// Render every variant of every image in `images`.
///
/// Returns one status per (image, option) pair in image-major order plus
/// the failures.
pub fn resize_album(
    backend: &impl ImageBackend,
    images: &[&Image],
    options: &[ResizeOption],
    target: &Path,
    album_id: &str,
) -> (Vec<VariantStatus>, Vec<TaskFailure>) {
    let tasks: Vec<(&Image, &ResizeOption)> = images
        .iter()
        .flat_map(|image| options.iter().map(move |option| (*image, option)))
        .collect();

    let results: Vec<Result<bool, TaskFailure>> = tasks
        .par_iter()
        .map(|(image, option)| {
            let output = image.cache_path(target, album_id, option);
            imaging::resize(backend, &image.path, &output, option, image.orientation).map_err(
                |e| TaskFailure {
                    source: image.path.clone(),
                    variant: option.name().to_string(),
                    error: e.to_string(),
                },
            )
        })
        .collect();

    split_results(results)
}

/// Copy every video to its content-addressed location.
pub fn copy_videos(
    videos: &[media::Video],
    target: &Path,
    album_id: &str,
) -> (Vec<VariantStatus>, Vec<TaskFailure>) {
    let results: Vec<Result<bool, TaskFailure>> = videos
        .par_iter()
        .map(|video| {
            imaging::copy_artifact(&video.path, &video.cache_path(target, album_id)).map_err(|e| {
                TaskFailure {
                    source: video.path.clone(),
                    variant: media::VIDEO_DIR.to_string(),
                    error: e.to_string(),
                }
            })
        })
        .collect();

    split_results(results)
}

fn split_results(
    results: Vec<Result<bool, TaskFailure>>,
) -> (Vec<VariantStatus>, Vec<TaskFailure>) {
    let mut statuses = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(true) => statuses.push(VariantStatus::Written),
            Ok(false) => statuses.push(VariantStatus::Cached),
            Err(failure) => {
                tracing::warn!(
                    source = %failure.source.display(),
                    variant = %failure.variant,
                    error = %failure.error,
                    "task failed"
                );
                statuses.push(VariantStatus::Failed);
                failures.push(failure);
            }
        }
    }
    (statuses, failures)
}

fn identify_all(backend: &impl ImageBackend, images: &[&Image]) -> HashMap<PathBuf, (u32, u32)> {
    images
        .par_iter()
        .filter_map(|image| match imaging::get_dimensions(backend, &image.path) {
            Ok(dims) => Some((image.path.clone(), dims)),
            Err(e) => {
                tracing::debug!(source = %image.path.display(), error = %e, "cannot identify");
                None
            }
        })
        .collect()
}

/// Load, render and copy one album.
pub fn process_album(
    album: &Album,
    backend: &impl ImageBackend,
    extractor: &dyn MetadataExtractor,
    settings: &BuildSettings,
    progress: Option<&Sender<ProcessEvent>>,
) -> Result<(AlbumReport, ProcessedAlbum), ProcessError> {
    let media = media::load_album_media(album, extractor, settings.no_cache).map_err(|source| {
        ProcessError::Media {
            album: album.id.clone(),
            source,
        }
    })?;
    std::fs::create_dir_all(media::album_dir(&settings.target, &album.id))?;

    let images = media.images_for_resize();
    send(
        progress,
        ProcessEvent::AlbumStarted {
            title: album.title.clone(),
            image_count: images.len(),
            video_count: media.videos.len(),
        },
    );

    let (image_statuses, mut failures) =
        resize_album(backend, &images, &settings.options, &settings.target, &album.id);
    let root = album.images.root();
    let per_image = settings.options.len().max(1);
    for (i, (image, statuses)) in images.iter().zip(image_statuses.chunks(per_image)).enumerate() {
        send(
            progress,
            ProcessEvent::ImageProcessed {
                index: i + 1,
                source_path: display_path(&image.path, root),
                variants: settings
                    .options
                    .iter()
                    .zip(statuses)
                    .map(|(option, status)| VariantInfo {
                        label: option.name().to_string(),
                        status: *status,
                    })
                    .collect(),
            },
        );
    }

    let (video_statuses, video_failures) =
        copy_videos(&media.videos, &settings.target, &album.id);
    failures.extend(video_failures);
    let video_root = album.videos.root();
    for (i, (video, status)) in media.videos.iter().zip(&video_statuses).enumerate() {
        send(
            progress,
            ProcessEvent::VideoCopied {
                index: i + 1,
                source_path: display_path(&video.path, video_root),
                status: *status,
            },
        );
    }

    let report = AlbumReport {
        id: album.id.clone(),
        title: album.title.clone(),
        resizes_written: count(&image_statuses, VariantStatus::Written),
        resizes_total: image_statuses.len(),
        videos_copied: count(&video_statuses, VariantStatus::Written),
        videos_total: video_statuses.len(),
        failures,
        cache: media.cache,
    };
    send(progress, ProcessEvent::AlbumFinished(report.clone()));

    let dimensions = identify_all(backend, &images);
    Ok((
        report,
        ProcessedAlbum {
            id: album.id.clone(),
            media,
            dimensions,
        },
    ))
}

fn count(statuses: &[VariantStatus], wanted: VariantStatus) -> usize {
    statuses.iter().filter(|s| **s == wanted).count()
}

/// Process every album of `gallery`, newest first.
///
/// Per-task failures and albums whose media cannot be loaded end up in the
/// report; the call only fails when the output tree cannot be written.
pub fn build(
    gallery: &Gallery,
    backend: &impl ImageBackend,
    extractor: &dyn MetadataExtractor,
    settings: &BuildSettings,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<BuildOutput, ProcessError> {
    std::fs::create_dir_all(&settings.target)?;
    let mut output = BuildOutput::default();
    for album in gallery.albums() {
        match process_album(album, backend, extractor, settings, progress.as_ref()) {
            Ok((report, processed)) => {
                output.report.albums.push(report);
                output.albums.push(processed);
            }
            Err(ProcessError::Media { album: id, source }) => {
                tracing::warn!(album = %id, error = %source, "album skipped");
                let failure = AlbumFailure {
                    id,
                    title: album.title.clone(),
                    error: source.to_string(),
                };
                send(progress.as_ref(), ProcessEvent::AlbumFailed(failure.clone()));
                output.report.album_failures.push(failure);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(output)
}
