//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides whether and how an artifact is produced) and the
//! [`backend`](super::backend) (which does the actual pixel work).
//!
//! ## Types
//!
//! - [`Quality`] — JPEG quality, 80–100. Out-of-range values are rejected on
//!   construction rather than clamped: a bad value is a configuration error.
//! - [`ResizeOption`] — a named size variant (target box, crop flag, quality).
//! - [`Orientation`] — counter-clockwise correction angle (0, 90, 180, 270).
//! - [`CropBox`] / [`RenderParams`] — full specification for one render.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Lowest accepted JPEG quality.
pub const MIN_QUALITY: u8 = 80;
/// Highest accepted JPEG quality.
pub const MAX_QUALITY: u8 = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("quality for '{variant}' must be between 80 and 100, got {quality}")]
    QualityOutOfRange { variant: String, quality: u8 },
    #[error("'{variant}' must have non-zero width and height, got {width}x{height}")]
    ZeroDimension {
        variant: String,
        width: u32,
        height: u32,
    },
    #[error("size variant name must be a non-empty single path segment, got {0:?}")]
    BadName(String),
}

/// JPEG encoding quality, guaranteed to lie in `80..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quality(u8);

impl Quality {
    /// Returns `None` when `value` is outside `80..=100`.
    pub fn new(value: u8) -> Option<Self> {
        (MIN_QUALITY..=MAX_QUALITY)
            .contains(&value)
            .then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(95)
    }
}

/// A named output size: target box, crop behaviour and encoding quality.
///
/// Construction validates everything, so holding a `ResizeOption` proves the
/// variant is usable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResizeOption {
    name: String,
    width: u32,
    height: u32,
    crop: bool,
    quality: Quality,
}

impl ResizeOption {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        crop: bool,
        quality: u8,
    ) -> Result<Self, OptionError> {
        let name = name.into();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(OptionError::BadName(name));
        }
        if width == 0 || height == 0 {
            return Err(OptionError::ZeroDimension {
                variant: name,
                width,
                height,
            });
        }
        let quality = Quality::new(quality).ok_or_else(|| OptionError::QualityOutOfRange {
            variant: name.clone(),
            quality,
        })?;
        Ok(Self {
            name,
            width,
            height,
            crop,
            quality,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn crop(&self) -> bool {
        self.crop
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// The longer side of the target box.
    pub fn size(&self) -> u32 {
        self.width.max(self.height)
    }
}

impl fmt::Display for ResizeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{}{}, q{})",
            self.name,
            self.width,
            self.height,
            if self.crop { ", crop" } else { "" },
            self.quality.value()
        )
    }
}

/// Rotation needed to display an image upright, in degrees counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Orientation {
    #[default]
    Upright,
    Ccw90,
    Ccw180,
    Ccw270,
}

impl Orientation {
    /// Map an EXIF orientation tag value. Mirrored variants are not corrected.
    ///
    /// `3` (rotate 180), `6` (rotate 90 CW) and `8` (rotate 270 CW) are the
    /// only values that need a rotation.
    pub fn from_exif(value: u32) -> Self {
        match value {
            3 => Self::Ccw180,
            6 => Self::Ccw270,
            8 => Self::Ccw90,
            _ => Self::Upright,
        }
    }

    pub fn angle(self) -> u16 {
        match self {
            Self::Upright => 0,
            Self::Ccw90 => 90,
            Self::Ccw180 => 180,
            Self::Ccw270 => 270,
        }
    }

    pub fn needs_rotation(self) -> bool {
        self != Self::Upright
    }

    /// Whether applying this rotation swaps width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Ccw90 | Self::Ccw270)
    }
}

impl TryFrom<u16> for Orientation {
    type Error = String;

    fn try_from(angle: u16) -> Result<Self, Self::Error> {
        match angle {
            0 => Ok(Self::Upright),
            90 => Ok(Self::Ccw90),
            180 => Ok(Self::Ccw180),
            270 => Ok(Self::Ccw270),
            other => Err(format!("orientation must be 0, 90, 180 or 270, got {other}")),
        }
    }
}

impl From<Orientation> for u16 {
    fn from(value: Orientation) -> Self {
        value.angle()
    }
}

/// Region kept by a crop, in the coordinates of the scaled image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Parameters for a single render: optional scale, optional crop, rotation,
/// then a JPEG encode at `quality`. Steps run in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Exact dimensions to scale to.
    pub scale: Option<(u32, u32)>,
    pub crop: Option<CropBox>,
    pub rotation: Orientation,
    pub quality: Quality,
}
