//! Letterbox geometry and non-maximum suppression for YOLO-style detectors.

use crate::geometry::{CornerBox, ImageDimensions};

/// Gray used for letterbox padding.
pub const PAD_VALUE: u8 = 114;
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.45;

/// Mapping between an original image and its square letterboxed input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub original: ImageDimensions,
    pub target: u32,
    pub scale: f64,
    /// Size of the resized image inside the padded square.
    pub resized: ImageDimensions,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    pub fn new(original: ImageDimensions, target: u32) -> Self {
        let (w, h) = (original.width.max(1) as f64, original.height.max(1) as f64);
        let scale = (target as f64 / w).min(target as f64 / h);
        let resized = ImageDimensions::new(
            ((w * scale).round() as u32).clamp(1, target),
            ((h * scale).round() as u32).clamp(1, target),
        );
        Self {
            original,
            target,
            scale,
            resized,
            pad_x: (target - resized.width) / 2,
            pad_y: (target - resized.height) / 2,
        }
    }

    /// Map a center-form box in letterbox pixels back to original corner pixels.
    pub fn to_original(&self, cx: f64, cy: f64, w: f64, h: f64) -> CornerBox {
        let (max_x, max_y) = (self.original.width as f64, self.original.height as f64);
        let unmap_x = |x: f64| ((x - self.pad_x as f64) / self.scale).clamp(0.0, max_x);
        let unmap_y = |y: f64| ((y - self.pad_y as f64) / self.scale).clamp(0.0, max_y);
        CornerBox::new(
            unmap_x(cx - w / 2.0),
            unmap_y(cy - h / 2.0),
            unmap_x(cx + w / 2.0),
            unmap_y(cy + h / 2.0),
        )
    }
}

/// Candidate box before suppression.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub bbox: CornerBox,
    pub score: f64,
    pub class_id: i64,
}

/// Class-wise greedy NMS. Output is sorted by descending score.
pub fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
