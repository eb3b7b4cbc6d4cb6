//! Prior detection records.
//!
//! A prior record is the persisted snapshot of the last detector run
//! (`last_detection.json`). Writers of that file vary, so every field has
//! aliases and every field is optional:
//!
//! ```json
//! {
//!   "output_image": "/static/results/annotated_1700000000000.jpg",
//!   "vehicle_count": 17,
//!   "detections": [{"bbox": [x1, y1, x2, y2], "conf": 0.91, "cls": 0}],
//!   "timestamp": 1700000000
//! }
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::path::Path;

/// Image identity keys, in priority order.
pub const IMAGE_KEYS: [&str; 3] = ["output_image", "image_name", "image_path"];
/// Timestamp keys, in priority order.
pub const TIMESTAMP_KEYS: [&str; 4] = ["timestamp", "time", "ts", "created_at"];

#[derive(Clone, Debug, PartialEq)]
pub struct PriorRecord {
    /// Image reference as written (path, URL path or bare name).
    pub image_ref: Option<String>,
    pub vehicle_count: Option<u64>,
    /// Raw detection entries, normalized later.
    pub detections: Option<Vec<Value>>,
    /// Seconds since the epoch.
    pub timestamp: Option<i64>,
    /// The record exactly as read.
    pub raw: Value,
}

impl PriorRecord {
    /// Interpret a JSON value. Anything but a mapping is not a record.
    pub fn from_value(value: Value) -> Option<Self> {
        let map = value.as_object()?;
        let image_ref = IMAGE_KEYS.iter().find_map(|key| {
            map.get(*key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        });
        let vehicle_count = map.get("vehicle_count").and_then(parse_count);
        let detections = map
            .get("detections")
            .and_then(Value::as_array)
            .cloned();
        let timestamp = TIMESTAMP_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(parse_timestamp));
        Some(Self {
            image_ref,
            vehicle_count,
            detections,
            timestamp,
            raw: value,
        })
    }

    pub fn from_json(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(value) => Self::from_value(value),
            Err(err) => {
                log::warn!("failed to parse detection record: {}", err);
                None
            }
        }
    }

    /// Read a record from disk. Missing or unreadable files yield `None`.
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text),
            Err(err) => {
                log::warn!("failed to read {}: {}", path.display(), err);
                None
            }
        }
    }

    /// File name of the referenced image.
    pub fn image_name(&self) -> Option<&str> {
        let reference = self.image_ref.as_deref()?;
        reference
            .rsplit(['/', '\\'])
            .next()
            .filter(|name| !name.is_empty())
    }

    /// True when the record references an image with this file name.
    pub fn refers_to(&self, image_name: &str) -> bool {
        self.image_name() == Some(image_name)
    }

    /// The detections list when present and non-empty.
    pub fn usable_detections(&self) -> Option<&[Value]> {
        self.detections.as_deref().filter(|d| !d.is_empty())
    }
}

/// Non-negative count from an integer, float (truncated) or integer string.
fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.trunc() as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Epoch seconds from a number, numeric string or ISO-8601 string.
///
/// Naive ISO timestamps are read as UTC.
pub fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<i64> {
    if let Ok(secs) = s.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    let naive = s.strip_suffix('Z').unwrap_or(s);
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(dt.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}
