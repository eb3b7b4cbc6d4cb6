//! Raw detector output and its normalization.
//!
//! Detections reach the reconciler in two shapes: keyed mappings from
//! persisted records and positional sequences from detectors. Both are parsed
//! into `RawDetection` first, then normalized into `Detection`.

use serde_json::{Map, Value};

use super::result::Detection;
use crate::geometry::CornerBox;

const BOX_KEYS: [&str; 2] = ["bbox", "xyxy"];
const CONFIDENCE_KEYS: [&str; 3] = ["conf", "confidence", "score"];
const CLASS_KEYS: [&str; 2] = ["cls", "class"];

/// Detection as produced by a detector or read from a prior record.
#[derive(Clone, Debug, PartialEq)]
pub enum RawDetection {
    /// `{"bbox"|"xyxy": [x1, y1, x2, y2], "conf"|"confidence"|"score": c, "cls"|"class": k}`
    Keyed {
        bbox: Option<Vec<f64>>,
        confidence: Option<f64>,
        class_id: Option<i64>,
    },
    /// `[x1, y1, x2, y2, conf?, class?]`; non-numeric entries are `None`.
    Positional(Vec<Option<f64>>),
}

impl RawDetection {
    /// Positional detection with every field present.
    pub fn corner(bbox: CornerBox, confidence: f64, class_id: i64) -> Self {
        let [x1, y1, x2, y2] = bbox.to_array();
        RawDetection::Positional(vec![
            Some(x1),
            Some(y1),
            Some(x2),
            Some(y2),
            Some(confidence),
            Some(class_id as f64),
        ])
    }

    /// Parse a JSON value. Values that are neither mappings nor sequences
    /// yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from_map(map)),
            Value::Array(items) => Some(RawDetection::Positional(
                items.iter().map(number_of).collect(),
            )),
            _ => None,
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let bbox = BOX_KEYS.iter().find_map(|key| {
            let items = map.get(*key)?.as_array()?;
            let values: Option<Vec<f64>> = items.iter().take(4).map(number_of).collect();
            values.filter(|v| v.len() == 4)
        });
        let confidence = CONFIDENCE_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(number_of));
        let class_id = CLASS_KEYS
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(number_of)
            .map(|v| v.trunc() as i64);
        RawDetection::Keyed {
            bbox,
            confidence,
            class_id,
        }
    }

    /// Normalize into a canonical detection. `None` when no box is parsable.
    ///
    /// Missing confidence reads as `0.0`, missing class as `0`.
    pub fn normalize(&self) -> Option<Detection> {
        let (bbox, confidence, class_id) = match self {
            RawDetection::Keyed {
                bbox,
                confidence,
                class_id,
            } => (
                bbox.as_deref().and_then(CornerBox::from_slice)?,
                *confidence,
                *class_id,
            ),
            RawDetection::Positional(values) => {
                let corners: Option<Vec<f64>> = values.iter().take(4).copied().collect();
                let bbox = corners.as_deref().and_then(CornerBox::from_slice)?;
                let confidence = values.get(4).copied().flatten();
                let class_id = values.get(5).copied().flatten().map(|v| v.trunc() as i64);
                (bbox, confidence, class_id)
            }
        };
        Some(Detection::new(
            bbox,
            confidence.unwrap_or(0.0),
            class_id.unwrap_or(0),
        ))
    }
}

/// Normalize every entry, silently dropping the ones without a usable box.
pub fn normalize_values(values: &[Value]) -> Vec<Detection> {
    values
        .iter()
        .filter_map(RawDetection::from_value)
        .filter_map(|raw| raw.normalize())
        .collect()
}

pub fn normalize_all(raw: &[RawDetection]) -> Vec<Detection> {
    raw.iter().filter_map(RawDetection::normalize).collect()
}

/// Finite number from a JSON number or numeric string.
pub(crate) fn number_of(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}
