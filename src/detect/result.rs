use serde::{Deserialize, Serialize};

use crate::geometry::{round_to, CornerBox};

/// Canonical detection as written to metrics reports.
///
/// `area_px` and `center` are always derived from `bbox`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// `[x1, y1, x2, y2]` in pixels.
    pub bbox: [f64; 4],
    pub conf: f64,
    pub cls: i64,
    pub area_px: f64,
    pub center: [f64; 2],
}

impl Detection {
    pub fn new(bbox: CornerBox, confidence: f64, class_id: i64) -> Self {
        let (cx, cy) = bbox.center();
        Self {
            bbox: bbox.to_array().map(|v| round_to(v, 2)),
            conf: round_to(confidence.clamp(0.0, 1.0), 4),
            cls: class_id,
            area_px: round_to(bbox.area(), 2),
            center: [round_to(cx, 2), round_to(cy, 2)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_fields_come_from_the_box() {
        let det = Detection::new(CornerBox::new(10.0, 20.0, 50.556, 40.0), 0.912345, 2);
        assert_eq!(det.bbox, [10.0, 20.0, 50.56, 40.0]);
        assert_eq!(det.area_px, 811.12);
        assert_eq!(det.center, [30.28, 30.0]);
        assert_eq!(det.conf, 0.9123);
        assert_eq!(det.cls, 2);
    }

    #[test]
    fn confidence_is_clamped() {
        let box_ = CornerBox::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(Detection::new(box_, 1.7, 0).conf, 1.0);
        assert_eq!(Detection::new(box_, -0.2, 0).conf, 0.0);
    }
}
