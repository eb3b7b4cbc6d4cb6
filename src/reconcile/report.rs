use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::risk::{RecommendedAction, RiskLevel};
use super::stats::{density_per_100k_px, ConfidenceStats, EstimatedMetrics};
use crate::detect::Detection;
use crate::fsutil::write_atomic;
use crate::geometry::ImageDimensions;

/// URL prefix under which the results directory is served.
pub const DEFAULT_PUBLIC_PREFIX: &str = "/static/results/";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    /// Public URL for images inside the results directory, the path otherwise.
    pub relative: String,
}

impl ImageRef {
    pub fn new(image: &Path, results_dir: &Path, public_prefix: &str) -> Self {
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative = if is_inside(image, results_dir) {
            format!("{}{}", public_prefix, name)
        } else {
            image.display().to_string()
        };
        Self { name, relative }
    }
}

fn is_inside(path: &Path, dir: &Path) -> bool {
    if path.starts_with(dir) {
        return true;
    }
    match (path.canonicalize(), dir.canonicalize()) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => false,
    }
}

/// Per-image metrics document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub generated_at: i64,
    pub generated_iso: String,
    pub image: ImageRef,
    pub vehicle_count: u64,
    pub detections: Vec<Detection>,
    pub confidence_stats: ConfidenceStats,
    pub image_size: Option<ImageDimensions>,
    pub density_per_100k_px: Option<f64>,
    pub estimated_metrics: EstimatedMetrics,
    pub risk_level: RiskLevel,
    pub recommended_iot_action: RecommendedAction,
    /// Prior record exactly as read, or `null`.
    pub source_last_detection: Option<Value>,
}

impl MetricsReport {
    /// Assemble a report; every derived field is computed here.
    pub fn assemble(
        image: ImageRef,
        vehicle_count: u64,
        detections: Vec<Detection>,
        image_size: Option<ImageDimensions>,
        source_last_detection: Option<Value>,
        now: DateTime<Utc>,
    ) -> Self {
        let confidence_stats = ConfidenceStats::from_detections(&detections);
        let estimated_metrics =
            EstimatedMetrics::estimate(confidence_stats.mean_conf, Some(vehicle_count));
        let risk_level = RiskLevel::classify(Some(vehicle_count));
        Self {
            generated_at: now.timestamp(),
            generated_iso: iso_utc(now),
            image,
            vehicle_count,
            density_per_100k_px: density_per_100k_px(vehicle_count, image_size),
            image_size: image_size.filter(|s| !s.is_empty()),
            detections,
            confidence_stats,
            estimated_metrics,
            risk_level,
            recommended_iot_action: risk_level.recommended_action(),
            source_last_detection,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize metrics report")
    }

    /// Write the report atomically.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json_pretty()?;
        write_atomic(path, json.as_bytes())
    }
}

/// ISO-8601 UTC timestamp with microseconds and a `Z` suffix.
pub fn iso_utc(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}
