//! Bounding box representations.
//!
//! Two shapes flow through the crate:
//! - `BoundingBox`: normalized center form `(cx, cy, w, h)`, the canonical
//!   label representation.
//! - `CornerBox`: pixel corner form `(x1, y1, x2, y2)`, as produced by detectors.

use serde::{Deserialize, Serialize};

/// Lower bound applied when clamping repaired coordinates.
pub const CLAMP_MIN: f64 = 1e-6;

/// Decimal places written to canonical label lines.
pub const LABEL_DECIMALS: i32 = 6;

/// Image size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Bounding box in normalized center form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    pub fn new(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self { cx, cy, w, h }
    }

    /// `(cx, cy, w, h)` given in pixels.
    pub fn from_center_pixels(cx: f64, cy: f64, w: f64, h: f64, dims: ImageDimensions) -> Self {
        let (iw, ih) = (dims.width as f64, dims.height as f64);
        Self::new(cx / iw, cy / ih, w / iw, h / ih)
    }

    /// `(x1, y1, x2, y2)` given in pixels.
    pub fn from_corner_pixels(x1: f64, y1: f64, x2: f64, y2: f64, dims: ImageDimensions) -> Self {
        let w = x2 - x1;
        let h = y2 - y1;
        Self::from_center_pixels(x1 + w / 2.0, y1 + h / 2.0, w, h, dims)
    }

    /// `(x, y, w, h)` given in pixels with `(x, y)` the top-left corner.
    pub fn from_top_left_pixels(x: f64, y: f64, w: f64, h: f64, dims: ImageDimensions) -> Self {
        Self::from_center_pixels(x + w / 2.0, y + h / 2.0, w, h, dims)
    }

    /// True when `0 <= cx, cy <= 1` and `0 < w, h <= 1`.
    pub fn is_canonical(&self) -> bool {
        (0.0..=1.0).contains(&self.cx)
            && (0.0..=1.0).contains(&self.cy)
            && self.w > 0.0
            && self.w <= 1.0
            && self.h > 0.0
            && self.h <= 1.0
    }

    /// Clamp every coordinate into `[CLAMP_MIN, 1.0]`.
    pub fn clamped(&self) -> Self {
        let clamp = |v: f64| v.clamp(CLAMP_MIN, 1.0);
        Self::new(clamp(self.cx), clamp(self.cy), clamp(self.w), clamp(self.h))
    }

    pub fn rounded(&self, decimals: i32) -> Self {
        Self::new(
            round_to(self.cx, decimals),
            round_to(self.cy, decimals),
            round_to(self.w, decimals),
            round_to(self.h, decimals),
        )
    }

    /// Canonical annotation line: `"<class> <cx> <cy> <w> <h>"`.
    pub fn to_label_line(&self, class_id: i64) -> String {
        format!(
            "{} {:.6} {:.6} {:.6} {:.6}",
            class_id, self.cx, self.cy, self.w, self.h
        )
    }
}

/// Bounding box in pixel corner form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CornerBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CornerBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from the first four values; `None` when fewer are given.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [x1, y1, x2, y2, ..] => Some(Self::new(*x1, *y1, *x2, *y2)),
            _ => None,
        }
    }

    /// Area with negative extents treated as zero.
    pub fn area(&self) -> f64 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn iou(&self, other: &CornerBox) -> f64 {
        let inter = CornerBox::new(
            self.x1.max(other.x1),
            self.y1.max(other.y1),
            self.x2.min(other.x2),
            self.y2.min(other.y2),
        )
        .area();
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Round half away from zero; never returns negative zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor + 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD: ImageDimensions = ImageDimensions {
        width: 1280,
        height: 720,
    };

    #[test]
    fn corner_pixels_normalize_against_image_size() {
        let bbox = BoundingBox::from_corner_pixels(100.0, 100.0, 300.0, 400.0, HD)
            .rounded(LABEL_DECIMALS);
        assert_eq!(bbox, BoundingBox::new(0.15625, 0.347222, 0.15625, 0.416667));
    }

    #[test]
    fn top_left_pixels_offset_to_center() {
        let bbox = BoundingBox::from_top_left_pixels(0.0, 0.0, 640.0, 360.0, HD);
        assert_eq!(bbox, BoundingBox::new(0.25, 0.25, 0.5, 0.5));
    }

    #[test]
    fn clamped_box_is_canonical() {
        let bbox = BoundingBox::new(-0.5, 1.7, 0.0, 3.0).clamped();
        assert!(bbox.is_canonical());
        assert_eq!(bbox, BoundingBox::new(CLAMP_MIN, 1.0, CLAMP_MIN, 1.0));
    }

    #[test]
    fn zero_width_is_not_canonical() {
        assert!(!BoundingBox::new(0.5, 0.5, 0.0, 0.2).is_canonical());
        assert!(BoundingBox::new(0.0, 1.0, 1.0, 0.1).is_canonical());
    }

    #[test]
    fn label_line_uses_six_decimals() {
        let line = BoundingBox::new(0.5, 0.5, 0.25, 1.0 / 3.0).to_label_line(0);
        assert_eq!(line, "0 0.500000 0.500000 0.250000 0.333333");
    }

    #[test]
    fn rounding_drops_negative_zero() {
        let line = BoundingBox::new(-1e-9, 0.5, 0.1, 0.1)
            .rounded(LABEL_DECIMALS)
            .to_label_line(0);
        assert_eq!(line, "0 0.000000 0.500000 0.100000 0.100000");
    }

    #[test]
    fn corner_box_area_ignores_inverted_extents() {
        assert_eq!(CornerBox::new(10.0, 10.0, 5.0, 30.0).area(), 0.0);
        assert_eq!(CornerBox::new(0.0, 0.0, 4.0, 5.0).area(), 20.0);
        assert_eq!(CornerBox::new(0.0, 0.0, 4.0, 6.0).center(), (2.0, 3.0));
    }

    #[test]
    fn corner_box_iou() {
        let a = CornerBox::new(0.0, 0.0, 10.0, 10.0);
        let b = CornerBox::new(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(a.iou(&CornerBox::new(20.0, 20.0, 30.0, 30.0)), 0.0);
    }

    #[test]
    fn from_slice_needs_four_values() {
        assert!(CornerBox::from_slice(&[1.0, 2.0, 3.0]).is_none());
        assert_eq!(
            CornerBox::from_slice(&[1.0, 2.0, 3.0, 4.0, 0.9]),
            Some(CornerBox::new(1.0, 2.0, 3.0, 4.0))
        );
    }
}
