//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: identify and render. Deciding *what* to render lives in
//! [`operations`](super::operations); a backend only moves pixels.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate's pure Rust decoders and JPEG encoder.

use super::params::RenderParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<Dimensions> for (u32, u32) {
    fn from(d: Dimensions) -> Self {
        (d.width, d.height)
    }
}

/// Trait for image processing backends.
///
/// `Sync` is required so one backend can be shared by every worker in the
/// rayon pool.
pub trait ImageBackend: Sync {
    /// Get image dimensions without decoding pixel data where possible.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode `params.source`, apply scale, crop and rotation in that order,
    /// and encode a JPEG to `params.output`.
    fn render(&self, params: &RenderParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::{Orientation, Quality};
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Mock backend that records operations instead of decoding images.
    ///
    /// Sync, so it can be shared across rayon workers.
    /// Lookups are keyed by path so results do not depend on task order.
    /// `render` writes a small marker file so existence checks behave like
    /// the real backend.
    pub struct MockBackend {
        pub default_dimensions: Dimensions,
        pub dimensions: Mutex<HashMap<PathBuf, Dimensions>>,
        /// Source file names whose identify/render should fail.
        pub failing: Mutex<HashSet<String>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Render {
            source: String,
            output: String,
            scale: Option<(u32, u32)>,
            crop: Option<(u32, u32, u32, u32)>,
            rotation: u16,
            quality: u8,
        },
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self::with_default_dimensions(4000, 3000)
        }
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_default_dimensions(width: u32, height: u32) -> Self {
            Self {
                default_dimensions: Dimensions { width, height },
                dimensions: Mutex::new(HashMap::new()),
                failing: Mutex::new(HashSet::new()),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn set_dimensions(&self, path: &Path, width: u32, height: u32) {
            self.dimensions
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), Dimensions { width, height });
        }

        pub fn fail_on(&self, file_name: &str) {
            self.failing.lock().unwrap().insert(file_name.to_string());
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn render_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Render { .. }))
                .count()
        }

        fn check_failing(&self, path: &Path) -> Result<(), BackendError> {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if self.failing.lock().unwrap().contains(&name) {
                return Err(BackendError::ProcessingFailed(format!(
                    "mock failure for {name}"
                )));
            }
            Ok(())
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));
            self.check_failing(path)?;

            Ok(self
                .dimensions
                .lock()
                .unwrap()
                .get(path)
                .copied()
                .unwrap_or(self.default_dimensions))
        }

        fn render(&self, params: &RenderParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Render {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                scale: params.scale,
                crop: params.crop.map(|c| (c.x, c.y, c.width, c.height)),
                rotation: params.rotation.angle(),
                quality: params.quality.value(),
            });
            self.check_failing(&params.source)?;
            std::fs::write(&params.output, b"mock render")?;
            Ok(())
        }
    }

    #[test]
    fn mock_identify_uses_per_path_dimensions() {
        let backend = MockBackend::new();
        backend.set_dimensions(Path::new("/test/small.jpg"), 800, 600);

        let small = backend.identify(Path::new("/test/small.jpg")).unwrap();
        assert_eq!((small.width, small.height), (800, 600));

        let other = backend.identify(Path::new("/test/other.jpg")).unwrap();
        assert_eq!((other.width, other.height), (4000, 3000));

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/small.jpg"));
    }

    #[test]
    fn mock_render_writes_marker_and_records() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out.jpg");
        let backend = MockBackend::new();

        backend
            .render(&RenderParams {
                source: "/source.jpg".into(),
                output: output.clone(),
                scale: Some((800, 600)),
                crop: None,
                rotation: Orientation::Ccw90,
                quality: Quality::new(90).unwrap(),
            })
            .unwrap();

        assert!(output.exists());
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Render {
                scale: Some((800, 600)),
                rotation: 90,
                quality: 90,
                ..
            }
        ));
    }

    #[test]
    fn mock_fails_on_request() {
        let backend = MockBackend::new();
        backend.fail_on("broken.jpg");
        assert!(backend.identify(Path::new("/a/broken.jpg")).is_err());
        assert!(backend.identify(Path::new("/a/fine.jpg")).is_ok());
    }
}
