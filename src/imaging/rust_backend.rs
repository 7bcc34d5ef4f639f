//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Scale | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Crop | `DynamicImage::crop_imm` |
//! | Rotate | `rotate90` / `rotate180` / `rotate270` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{Orientation, RenderParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn open(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)
}

/// Load and decode an image from disk. The format is sniffed from content.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    open(path)?.decode().map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    })
}

/// Apply a counter-clockwise correction. `image` rotates clockwise.
fn rotate(img: DynamicImage, rotation: Orientation) -> DynamicImage {
    match rotation {
        Orientation::Upright => img,
        Orientation::Ccw90 => img.rotate270(),
        Orientation::Ccw180 => img.rotate180(),
        Orientation::Ccw270 => img.rotate90(),
    }
}

/// Encode as baseline JPEG. Alpha is dropped; grayscale stays grayscale.
fn save_jpeg(img: DynamicImage, path: &Path, quality: u8) -> Result<(), BackendError> {
    let img = match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLumaA16(_) => DynamicImage::ImageLuma8(img.to_luma8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };
    let file = std::fs::File::create(path).map_err(BackendError::Io)?;
    let writer = std::io::BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(writer, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = open(path)?.into_dimensions().map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn render(&self, params: &RenderParams) -> Result<(), BackendError> {
        let mut img = load_image(&params.source)?;
        if let Some((width, height)) = params.scale {
            img = img.resize_exact(width, height, FilterType::Lanczos3);
        }
        if let Some(c) = params.crop {
            img = img.crop_imm(c.x, c.y, c.width, c.height);
        }
        let img = rotate(img, params.rotation);
        save_jpeg(img, &params.output, params.quality.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{CropBox, Quality};
    use crate::test_helpers::create_test_jpeg;
    use image::ImageFormat;

    fn render_params(source: &Path, output: &Path) -> RenderParams {
        RenderParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            scale: None,
            crop: None,
            rotation: Orientation::Upright,
            quality: Quality::new(85).unwrap(),
        }
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!((dims.width, dims.height), (200, 150));
    }

    #[test]
    fn identify_ignores_misleading_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("actually-a-jpeg.part");
        create_test_jpeg(&path, 64, 32);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!((dims.width, dims.height), (64, 32));
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let result = RustBackend::new().identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn identify_garbage_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("noise.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();

        assert!(RustBackend::new().identify(&path).is_err());
    }

    #[test]
    fn render_scale_then_crop() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 400, 300);
        let output = tmp.path().join("thumb.jpg");

        let backend = RustBackend::new();
        backend
            .render(&RenderParams {
                scale: Some((200, 150)),
                crop: Some(CropBox {
                    x: 25,
                    y: 0,
                    width: 150,
                    height: 150,
                }),
                ..render_params(&source, &output)
            })
            .unwrap();

        let dims = backend.identify(&output).unwrap();
        assert_eq!((dims.width, dims.height), (150, 150));
    }

    #[test]
    fn render_rotation_swaps_axes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 120, 80);
        let output = tmp.path().join("rotated.jpg");

        let backend = RustBackend::new();
        backend
            .render(&RenderParams {
                rotation: Orientation::Ccw90,
                ..render_params(&source, &output)
            })
            .unwrap();

        let dims = backend.identify(&output).unwrap();
        assert_eq!((dims.width, dims.height), (80, 120));
    }

    #[test]
    fn render_png_with_alpha_to_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        image::RgbaImage::from_pixel(40, 30, image::Rgba([10, 20, 30, 128]))
            .save(&source)
            .unwrap();
        let output = tmp.path().join("out.jpg");

        let backend = RustBackend::new();
        backend
            .render(&RenderParams {
                scale: Some((20, 15)),
                ..render_params(&source, &output)
            })
            .unwrap();

        let format = ImageReader::open(&output)
            .unwrap()
            .with_guessed_format()
            .unwrap()
            .format();
        assert_eq!(format, Some(ImageFormat::Jpeg));
    }
}
