//! Coordinate-system inference for raw annotation values.
//!
//! Raw label files mix conventions: normalized center boxes, pixel center
//! boxes, pixel corner boxes and pixel top-left boxes. The convention is
//! inferred per line from an ordered decision table so the same input always
//! resolves the same way:
//!
//! | # | condition (values `a b c d`, image `iw ih`)    | interpretation       |
//! |---|------------------------------------------------|----------------------|
//! | 1 | `c > 1 && d > 1 && a <= iw && b <= ih`          | center pixels        |
//! | 2 | `c > a && d > b && c <= iw && d <= ih`          | corner pixels        |
//! | 3 | otherwise                                       | top-left pixels      |
//!
//! The table is only consulted when some value exceeds `1.0` and the image
//! size is known.

use serde::Deserialize;

use super::line::SkipReason;
use crate::geometry::{BoundingBox, ImageDimensions};

/// Interpretation of a line's four coordinate values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinateSystem {
    /// Every value is within `[0, 1]`: already normalized center form.
    Normalized,
    /// Some value exceeds `1.0` but the image size is unknown.
    Unscaled,
    CenterPixels,
    CornerPixels,
    /// Fallback row of the table; `(x, y)` is the top-left corner.
    TopLeftPixels,
}

/// How ambiguous pixel geometry is handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceMode {
    /// Convert every line with the decision table, guessing when needed.
    #[default]
    BestGuess,
    /// Reject lines that need the fallback row or lack an image size.
    Strict,
}

impl CoordinateSystem {
    pub fn infer(values: [f64; 4], dims: Option<ImageDimensions>) -> Self {
        let [a, b, c, d] = values;
        if values.iter().all(|v| *v <= 1.0) {
            return CoordinateSystem::Normalized;
        }
        let Some(dims) = dims.filter(|d| !d.is_empty()) else {
            return CoordinateSystem::Unscaled;
        };
        let (iw, ih) = (dims.width as f64, dims.height as f64);

        if c > 1.0 && d > 1.0 && a <= iw && b <= ih {
            CoordinateSystem::CenterPixels
        } else if c > a && d > b && c <= iw && d <= ih {
            CoordinateSystem::CornerPixels
        } else {
            CoordinateSystem::TopLeftPixels
        }
    }

    /// Convert values read in this system to a normalized center box.
    ///
    /// Pixel systems require `dims`; `Normalized` and `Unscaled` pass the
    /// values through unchanged.
    pub fn to_box(self, values: [f64; 4], dims: Option<ImageDimensions>) -> Option<BoundingBox> {
        let [a, b, c, d] = values;
        match (self, dims) {
            (CoordinateSystem::Normalized | CoordinateSystem::Unscaled, _) => {
                Some(BoundingBox::new(a, b, c, d))
            }
            (CoordinateSystem::CenterPixels, Some(dims)) => {
                Some(BoundingBox::from_center_pixels(a, b, c, d, dims))
            }
            (CoordinateSystem::CornerPixels, Some(dims)) => {
                Some(BoundingBox::from_corner_pixels(a, b, c, d, dims))
            }
            (CoordinateSystem::TopLeftPixels, Some(dims)) => {
                Some(BoundingBox::from_top_left_pixels(a, b, c, d, dims))
            }
            (_, None) => None,
        }
    }
}

/// Infer the coordinate system for `values` and convert, honoring `mode`.
pub fn resolve_box(
    values: [f64; 4],
    dims: Option<ImageDimensions>,
    mode: InferenceMode,
) -> Result<(CoordinateSystem, BoundingBox), SkipReason> {
    let system = CoordinateSystem::infer(values, dims);
    if mode == InferenceMode::Strict {
        match system {
            CoordinateSystem::Unscaled => return Err(SkipReason::MissingImageDimensions),
            CoordinateSystem::TopLeftPixels => return Err(SkipReason::AmbiguousGeometry),
            _ => {}
        }
    }
    let bbox = system
        .to_box(values, dims)
        .ok_or(SkipReason::MissingImageDimensions)?;
    Ok((system, bbox))
}
