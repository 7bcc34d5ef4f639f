//! Pure calculation functions for resize geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Dimension math is done in integers so results truncate exactly the way
//! the documented examples do (a float detour can land one pixel short).

use super::params::{CropBox, Orientation, ResizeOption};

/// `true` when either source side exceeds the target box.
///
/// An image exactly the size of the target box is not bigger.
pub fn is_bigger(source: (u32, u32), target: (u32, u32)) -> bool {
    source.0 > target.0 || source.1 > target.1
}

fn is_landscape(source: (u32, u32)) -> bool {
    source.0 >= source.1
}

/// `floor(value * numerator / denominator)`, at least 1.
fn scale_side(value: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = value as u64 * numerator as u64 / denominator.max(1) as u64;
    (scaled as u32).max(1)
}

/// Scale so the shorter source side becomes `size`, preserving aspect ratio.
///
/// # Examples
/// ```
/// # use behappy::imaging::calculations::scale_min_size;
/// // 4000x3000 landscape: the height is the short side → 400x300
/// assert_eq!(scale_min_size((4000, 3000), 300), (400, 300));
/// ```
pub fn scale_min_size(source: (u32, u32), size: u32) -> (u32, u32) {
    let (w, h) = source;
    if is_landscape(source) {
        (scale_side(w, size, h), size)
    } else {
        (size, scale_side(h, size, w))
    }
}

/// Scale into a target box, binding on height for portrait sources and on
/// width for landscape (and square) sources.
///
/// Only the binding side is guaranteed to fit: a landscape source whose
/// aspect is taller than the box keeps a height above the target.
///
/// # Examples
/// ```
/// # use behappy::imaging::calculations::scale_to;
/// assert_eq!(scale_to((4000, 3000), (1920, 1080)), (1920, 1440));
/// assert_eq!(scale_to((3000, 4000), (1920, 1080)), (810, 1080));
/// ```
pub fn scale_to(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (w, h) = source;
    let (tw, th) = target;
    if is_landscape(source) {
        (tw, scale_side(h, tw, w))
    } else {
        (scale_side(w, th, h), th)
    }
}

/// Centered crop of `target` out of `scaled`.
///
/// Offsets are `floor((scaled - target) / 2)`; a target larger than the
/// scaled image on some axis is clipped to the scaled size.
pub fn center_crop(scaled: (u32, u32), target: (u32, u32)) -> CropBox {
    let width = target.0.min(scaled.0);
    let height = target.1.min(scaled.1);
    CropBox {
        x: (scaled.0 - width) / 2,
        y: (scaled.1 - height) / 2,
        width,
        height,
    }
}

/// What has to happen to turn a source image into a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// Copy source bytes verbatim: no scale and no rotation needed.
    Passthrough,
    /// Decode, transform and re-encode.
    Render {
        scale: Option<(u32, u32)>,
        crop: Option<CropBox>,
        rotation: Orientation,
    },
}

impl ResizePlan {
    /// Final output dimensions for a source of the given size.
    pub fn output_dimensions(&self, source: (u32, u32)) -> (u32, u32) {
        match self {
            Self::Passthrough => source,
            Self::Render {
                scale,
                crop,
                rotation,
            } => {
                let (w, h) = match (crop, scale) {
                    (Some(c), _) => (c.width, c.height),
                    (None, Some(s)) => *s,
                    (None, None) => source,
                };
                if rotation.swaps_axes() { (h, w) } else { (w, h) }
            }
        }
    }
}

/// Decide how to produce `option` from a source of the given dimensions.
///
/// 1. Not bigger than the box → no scale.
/// 2. Bigger with crop → [`scale_min_size`] to the box's longer side, then
///    [`center_crop`] to exactly the box.
/// 3. Bigger without crop → [`scale_to`].
/// 4. Any non-zero orientation adds a rotation.
/// 5. Nothing to do → [`ResizePlan::Passthrough`].
pub fn plan_resize(
    source: (u32, u32),
    option: &ResizeOption,
    orientation: Orientation,
) -> ResizePlan {
    let target = (option.width(), option.height());
    let (scale, crop) = if !is_bigger(source, target) {
        (None, None)
    } else if option.crop() {
        let scaled = scale_min_size(source, option.size());
        (Some(scaled), Some(center_crop(scaled, target)))
    } else {
        (Some(scale_to(source, target)), None)
    };

    if scale.is_none() && !orientation.needs_rotation() {
        return ResizePlan::Passthrough;
    }
    ResizePlan::Render {
        scale,
        crop,
        rotation: orientation,
    }
}
