//! Shared test utilities.
//!
//! Fixture builders for albums on disk, synthetic JPEGs (with or without
//! EXIF), and a counting metadata extractor that never touches the files.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let album = album_with_media(tmp.path(), &["a.jpg", "b.jpg"], &[], None);
//! let extractor = CountingExtractor::new();
//! let media = load_album_media(&album, &extractor, false).unwrap();
//! assert_eq!(extractor.calls(), 1);
//! ```

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::FixedOffset;

use crate::config::GalleryConfig;
use crate::descriptor::{self, Descriptor, MediaSpec};
use crate::gallery::Album;
use crate::metadata::{MediaMetadata, MetadataError, MetadataExtractor};

// =========================================================================
// Synthetic images
// =========================================================================

/// Write a small gradient JPEG. Different sizes give different bytes.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    img.save_with_format(path, image::ImageFormat::Jpeg).unwrap();
}

/// Write a JPEG carrying an EXIF orientation tag and capture date.
///
/// `date` uses the EXIF spelling, e.g. `2019:07:14 10:11:12`.
pub fn create_test_jpeg_with_exif(
    path: &Path,
    width: u32,
    height: u32,
    orientation: u16,
    date: &str,
) {
    create_test_jpeg(path, width, height);
    let jpeg = fs::read(path).unwrap();

    let orientation_field = exif::Field {
        tag: exif::Tag::Orientation,
        ifd_num: exif::In::PRIMARY,
        value: exif::Value::Short(vec![orientation]),
    };
    let date_field = exif::Field {
        tag: exif::Tag::DateTimeOriginal,
        ifd_num: exif::In::PRIMARY,
        value: exif::Value::Ascii(vec![date.as_bytes().to_vec()]),
    };
    let mut writer = exif::experimental::Writer::new();
    writer.push_field(&orientation_field);
    writer.push_field(&date_field);
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    // APP1 segment right after SOI
    let mut app1 = vec![0xFF, 0xE1];
    let length = (tiff.len() + 6 + 2) as u16;
    app1.extend_from_slice(&length.to_be_bytes());
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&tiff);

    let mut out = Vec::with_capacity(jpeg.len() + app1.len());
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    fs::write(path, out).unwrap();
}

// =========================================================================
// Metadata
// =========================================================================

/// Extractor that counts calls and answers from file names alone.
#[derive(Default)]
pub struct CountingExtractor {
    calls: AtomicUsize,
    files: AtomicUsize,
    fail: bool,
}

impl CountingExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An extractor whose every call fails like a broken subprocess.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of `extract` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Total number of paths passed to `extract` so far.
    pub fn files_seen(&self) -> usize {
        self.files.load(Ordering::SeqCst)
    }
}

impl MetadataExtractor for CountingExtractor {
    fn extract(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, MediaMetadata)>, MetadataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.files.fetch_add(paths.len(), Ordering::SeqCst);
        if self.fail {
            return Err(MetadataError::Spawn {
                program: "counting".into(),
                source: std::io::Error::other("boom"),
            });
        }
        Ok(paths
            .iter()
            .map(|p| {
                let summary = p
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                (
                    p.clone(),
                    MediaMetadata {
                        summary,
                        ..MediaMetadata::default()
                    },
                )
            })
            .collect())
    }
}

// =========================================================================
// Albums and descriptors
// =========================================================================

/// Write `<folder>/behappy.toml` for an album titled after its id.
pub fn write_descriptor(
    folder: &Path,
    id: &str,
    parent: Option<&str>,
    date: &str,
    tags: &[&str],
) -> PathBuf {
    fs::create_dir_all(folder).unwrap();
    let mut content = format!("[album]\nid = \"{id}\"\ntitle = \"{id}\"\ndate = {date}\n");
    if let Some(parent) = parent {
        content.push_str(&format!("parent = \"{parent}\"\n"));
    }
    let tags: Vec<String> = tags.iter().map(|t| format!("\"{t}\"")).collect();
    content.push_str(&format!("tags = [{}]\n", tags.join(", ")));
    content.push_str("\n[images]\ninclude = [\"*.jpg\"]\n");
    let path = folder.join(descriptor::DESCRIPTOR_FILENAME);
    fs::write(&path, content).unwrap();
    path
}

/// Default config reading albums from `root`.
pub fn gallery_config(root: &Path) -> GalleryConfig {
    let mut config = GalleryConfig::default();
    config.gallery.source = vec![".".to_string()];
    config.base_dir = root.to_path_buf();
    config
}

/// In-memory album whose descriptor path is `<root>/<title>/behappy.toml`.
///
/// Nothing is written to disk.
pub fn album_fixture(root: &Path, id: &str, title: &str, date: &str) -> Album {
    let descriptor = Descriptor {
        path: root.join(title).join(descriptor::DESCRIPTOR_FILENAME),
        id: id.to_string(),
        parent: None,
        title: title.to_string(),
        description: String::new(),
        date: chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        tags: Default::default(),
        hidden: false,
        images: MediaSpec::default(),
        videos: MediaSpec::default(),
    };
    Album::from_descriptor(descriptor, FixedOffset::east_opt(0).unwrap()).unwrap()
}

/// Album folder `<root>/album` with real files and a descriptor including
/// `*.jpg` images and `*.mp4` videos.
///
/// Every image gets distinct content. A thumbnail, if named, is created too.
pub fn album_with_media(
    root: &Path,
    images: &[&str],
    videos: &[&str],
    thumbnail: Option<&str>,
) -> Album {
    let folder = root.join("album");
    fs::create_dir_all(&folder).unwrap();
    for (i, name) in images.iter().enumerate() {
        create_test_jpeg(&folder.join(name), 8 + i as u32, 8);
    }
    for name in videos {
        fs::write(folder.join(name), format!("video {name}")).unwrap();
    }
    let mut content = String::from(
        "[album]\nid = \"lake\"\ntitle = \"Lake\"\ndate = 2019-07-14\n\n\
         [images]\ninclude = [\"*.jpg\"]\n",
    );
    if let Some(thumbnail) = thumbnail {
        let path = folder.join(thumbnail);
        if !path.exists() {
            create_test_jpeg(&path, 5, 7);
        }
        content.push_str(&format!("thumbnail = \"{thumbnail}\"\n"));
    }
    content.push_str("\n[videos]\ninclude = [\"*.mp4\"]\n");

    let path = folder.join(descriptor::DESCRIPTOR_FILENAME);
    fs::write(&path, content).unwrap();
    let descriptor = descriptor::parse_descriptor(&path).unwrap().unwrap();
    Album::from_descriptor(descriptor, FixedOffset::east_opt(0).unwrap()).unwrap()
}
