//! Image processing — pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Resize → JPEG** | Lanczos3 + `JpegEncoder` at the variant's quality |
//! | **Crop** | scale short side to the box, then centered `crop_imm` |
//! | **Orientation** | `rotate90` / `rotate180` / `rotate270` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
pub mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{ResizePlan, plan_resize};
pub use operations::{copy_artifact, get_dimensions, resize};
pub use params::{CropBox, OptionError, Orientation, Quality, RenderParams, ResizeOption};
pub use rust_backend::RustBackend;
