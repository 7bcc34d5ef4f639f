//! High-level image operations.
//!
//! These functions combine calculations with backend execution: they look
//! at the destination, plan the geometry, and hand the pixel work to an
//! [`ImageBackend`].
//!
//! Outputs are written to a hidden sibling file first and renamed into
//! place, so an interrupted build never leaves a truncated artifact that a
//! later run would mistake for a finished one.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{ResizePlan, plan_resize};
use super::params::{Orientation, RenderParams, ResizeOption};
use std::fs;
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Permission bits applied to every produced artifact.
pub const ARTIFACT_MODE: u32 = 0o644;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    Ok(backend.identify(path)?.into())
}

/// Produce the `option` variant of `source` at `output`.
///
/// Returns `Ok(false)` without touching anything when `output` already
/// exists; artifact names are content addressed, so an existing file is
/// the finished product. Otherwise the source is either copied verbatim
/// ([`ResizePlan::Passthrough`] of a JPEG source) or rendered, and
/// `Ok(true)` is returned. Other formats are always re-encoded so the
/// artifact holds JPEG bytes.
pub fn resize(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    option: &ResizeOption,
    orientation: Orientation,
) -> Result<bool> {
    if output.exists() {
        return Ok(false);
    }
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    let dims = get_dimensions(backend, source)?;
    let plan = plan_resize(dims, option, orientation);
    let staging = staging_path(output);

    let plan = match plan {
        ResizePlan::Passthrough if !is_jpeg(source)? => ResizePlan::Render {
            scale: None,
            crop: None,
            rotation: Orientation::Upright,
        },
        plan => plan,
    };

    let written = match plan {
        ResizePlan::Passthrough => fs::copy(source, &staging).map(|_| ()).map_err(Into::into),
        ResizePlan::Render {
            scale,
            crop,
            rotation,
        } => backend.render(&RenderParams {
            source: source.to_path_buf(),
            output: staging.clone(),
            scale,
            crop,
            rotation,
            quality: option.quality(),
        }),
    };
    if let Err(e) = written.and_then(|()| finish(&staging, output)) {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    Ok(true)
}

/// Whether the content of `path` is a JPEG stream, sniffed from its header.
fn is_jpeg(path: &Path) -> Result<bool> {
    let format = image::ImageReader::open(path)?.with_guessed_format()?.format();
    Ok(format == Some(image::ImageFormat::Jpeg))
}

/// Copy `source` to `output` byte for byte, unless `output` exists.
///
/// Same staging and permissions as [`resize`]. Returns whether a file was
/// written.
pub fn copy_artifact(source: &Path, output: &Path) -> Result<bool> {
    if output.exists() {
        return Ok(false);
    }
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = staging_path(output);
    let copied = fs::copy(source, &staging)
        .map(|_| ())
        .map_err(Into::into)
        .and_then(|()| finish(&staging, output));
    if let Err(e) = copied {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    Ok(true)
}

/// Hidden sibling of `output` used while writing.
fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    output.with_file_name(format!(".{name}.{}.part", uuid::Uuid::new_v4().simple()))
}

fn finish(staging: &Path, output: &Path) -> Result<()> {
    set_artifact_permissions(staging)?;
    fs::rename(staging, output)?;
    Ok(())
}

#[cfg(unix)]
fn set_artifact_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(ARTIFACT_MODE))
}

#[cfg(not(unix))]
fn set_artifact_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::test_helpers::create_test_jpeg;
    use tempfile::TempDir;

    fn option(width: u32, height: u32, crop: bool) -> ResizeOption {
        ResizeOption::new("small", width, height, crop, 90).unwrap()
    }

    #[test]
    fn get_dimensions_calls_backend() {
        let backend = MockBackend::with_default_dimensions(1920, 1080);
        let dims = get_dimensions(&backend, Path::new("/test.jpg")).unwrap();
        assert_eq!(dims, (1920, 1080));
    }

    #[test]
    fn resize_renders_when_source_is_bigger() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("photo.jpg");
        fs::write(&source, b"source bytes").unwrap();
        let output = tmp.path().join("out/small/abc.jpg");
        let backend = MockBackend::with_default_dimensions(4000, 3000);

        let produced = resize(
            &backend,
            &source,
            &output,
            &option(1920, 1080, false),
            Orientation::Upright,
        )
        .unwrap();

        assert!(produced);
        assert!(output.exists());
        let ops = backend.get_operations();
        assert!(matches!(
            &ops[1],
            RecordedOp::Render {
                scale: Some((1920, 1440)),
                crop: None,
                quality: 90,
                ..
            }
        ));
    }

    #[test]
    fn resize_passes_small_source_through_byte_for_byte() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("photo.jpg");
        create_test_jpeg(&source, 16, 12);
        let output = tmp.path().join("small.jpg");
        let backend = MockBackend::with_default_dimensions(640, 480);

        assert!(
            resize(
                &backend,
                &source,
                &output,
                &option(1280, 1280, false),
                Orientation::Upright
            )
            .unwrap()
        );

        assert_eq!(fs::read(&output).unwrap(), fs::read(&source).unwrap());
        assert_eq!(backend.render_count(), 0);
    }

    #[test]
    fn small_png_source_is_reencoded() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("drawing.png");
        image::RgbImage::new(16, 12)
            .save_with_format(&source, image::ImageFormat::Png)
            .unwrap();
        let output = tmp.path().join("small.jpg");
        let backend = MockBackend::with_default_dimensions(16, 12);

        resize(
            &backend,
            &source,
            &output,
            &option(1280, 1280, false),
            Orientation::Upright,
        )
        .unwrap();

        assert_eq!(backend.render_count(), 1);
        assert!(matches!(
            &backend.get_operations()[1],
            RecordedOp::Render {
                scale: None,
                crop: None,
                rotation: 0,
                ..
            }
        ));
    }

    #[test]
    fn small_png_becomes_a_real_jpeg() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("drawing.png");
        image::RgbImage::new(16, 12)
            .save_with_format(&source, image::ImageFormat::Png)
            .unwrap();
        let output = tmp.path().join("small.jpg");

        resize(
            &crate::imaging::RustBackend::new(),
            &source,
            &output,
            &option(1280, 1280, false),
            Orientation::Upright,
        )
        .unwrap();

        let bytes = fs::read(&output).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
        assert_eq!(image::image_dimensions(&output).unwrap(), (16, 12));
    }

    #[test]
    fn resize_rotates_small_source() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("photo.jpg");
        fs::write(&source, b"bytes").unwrap();
        let output = tmp.path().join("small.jpg");
        let backend = MockBackend::with_default_dimensions(640, 480);

        resize(
            &backend,
            &source,
            &output,
            &option(1280, 1280, false),
            Orientation::Ccw270,
        )
        .unwrap();

        assert!(matches!(
            &backend.get_operations()[1],
            RecordedOp::Render {
                scale: None,
                rotation: 270,
                ..
            }
        ));
    }

    #[test]
    fn resize_skips_existing_output() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("photo.jpg");
        fs::write(&source, b"bytes").unwrap();
        let output = tmp.path().join("small.jpg");
        fs::write(&output, b"already built").unwrap();
        let backend = MockBackend::new();

        let produced = resize(
            &backend,
            &source,
            &output,
            &option(300, 300, true),
            Orientation::Upright,
        )
        .unwrap();

        assert!(!produced);
        assert!(backend.get_operations().is_empty());
        assert_eq!(fs::read(&output).unwrap(), b"already built");
    }

    #[test]
    fn failed_render_leaves_no_output() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        fs::write(&source, b"bytes").unwrap();
        let output = tmp.path().join("small.jpg");
        let backend = MockBackend::new();
        backend.fail_on("broken.jpg");

        let result = resize(
            &backend,
            &source,
            &output,
            &option(300, 300, true),
            Orientation::Upright,
        );

        assert!(result.is_err());
        assert!(!output.exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn produced_artifact_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("photo.jpg");
        fs::write(&source, b"bytes").unwrap();
        let output = tmp.path().join("small.jpg");
        let backend = MockBackend::with_default_dimensions(10, 10);

        resize(
            &backend,
            &source,
            &output,
            &option(300, 300, false),
            Orientation::Upright,
        )
        .unwrap();

        let mode = fs::metadata(&output).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, ARTIFACT_MODE);
    }

    #[test]
    fn copy_artifact_copies_once() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("clip.mp4");
        fs::write(&source, b"video bytes").unwrap();
        let output = tmp.path().join("video/abc.mp4");

        assert!(copy_artifact(&source, &output).unwrap());
        assert_eq!(fs::read(&output).unwrap(), b"video bytes");

        fs::write(&source, b"changed").unwrap();
        assert!(!copy_artifact(&source, &output).unwrap());
        assert_eq!(fs::read(&output).unwrap(), b"video bytes");
    }

    #[test]
    fn copy_artifact_missing_source_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("video/abc.mp4");

        assert!(copy_artifact(&tmp.path().join("gone.mp4"), &output).is_err());
        assert!(!output.exists());
        assert_eq!(fs::read_dir(tmp.path().join("video")).unwrap().count(), 0);
    }
}
