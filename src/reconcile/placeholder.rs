//! Placeholder `metrics.json` for deployments without an evaluation run.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::report::iso_utc;
use crate::fsutil::write_atomic;

pub const PLACEHOLDER_NOTES: &str = "This is an auto-generated placeholder metrics.json. \
Replace with real metrics after evaluation.";
pub const SUMMARY_NOTES: &str =
    "Replace with computed metrics such as mAP@0.5, precision@0.5, recall@0.5";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlaceholderMetrics {
    pub created_at: String,
    pub notes: String,
    #[serde(rename = "mAP")]
    pub map: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    /// `(recall, precision)` pairs.
    pub pr_curve: Vec<(f64, f64)>,
    pub epochs: Option<u32>,
    pub train_images: Option<u64>,
    pub val_images: Option<u64>,
    pub last_detection: Option<Value>,
    pub summary: PlaceholderSummary,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlaceholderSummary {
    pub total_detections_logged: u64,
    pub notes: String,
}

impl PlaceholderMetrics {
    pub fn new(last_detection: Option<Value>, now: DateTime<Utc>) -> Self {
        Self {
            created_at: iso_utc(now),
            notes: PLACEHOLDER_NOTES.to_string(),
            map: None,
            precision: None,
            recall: None,
            pr_curve: Vec::new(),
            epochs: None,
            train_images: None,
            val_images: None,
            last_detection,
            summary: PlaceholderSummary {
                total_detections_logged: 0,
                notes: SUMMARY_NOTES.to_string(),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceholderOutcome {
    Created,
    AlreadyPresent,
}

/// Create `path` unless it already exists. Existing files are never touched.
pub fn write_placeholder(
    path: &Path,
    last_detection: Option<Value>,
    now: DateTime<Utc>,
) -> Result<PlaceholderOutcome> {
    if path.exists() {
        return Ok(PlaceholderOutcome::AlreadyPresent);
    }
    let metrics = PlaceholderMetrics::new(last_detection, now);
    let json = serde_json::to_string_pretty(&metrics)
        .context("failed to serialize placeholder metrics")?;
    write_atomic(path, json.as_bytes())?;
    Ok(PlaceholderOutcome::Created)
}
