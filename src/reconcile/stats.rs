//! Confidence statistics, density and heuristic quality estimates.

use serde::{Deserialize, Serialize};

use crate::detect::Detection;
use crate::geometry::{round_to, ImageDimensions};

/// Summary of detection confidences. Every field is `None` when there are
/// no detections.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    pub mean_conf: Option<f64>,
    pub median_conf: Option<f64>,
    /// Population standard deviation; `0.0` for a single sample.
    pub std_conf: Option<f64>,
    pub min_conf: Option<f64>,
    pub max_conf: Option<f64>,
}

impl ConfidenceStats {
    pub fn from_detections(detections: &[Detection]) -> Self {
        let confidences: Vec<f64> = detections.iter().map(|d| d.conf).collect();
        Self::from_values(&confidences)
    }

    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if values.len() > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
        } else {
            0.0
        };

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Self {
            mean_conf: Some(round_to(mean, 4)),
            median_conf: Some(round_to(median, 4)),
            std_conf: Some(round_to(std, 4)),
            min_conf: Some(round_to(sorted[0], 4)),
            max_conf: Some(round_to(sorted[sorted.len() - 1], 4)),
        }
    }
}

/// Vehicles per 100k pixels, rounded to 4 decimals.
pub fn density_per_100k_px(vehicle_count: u64, size: Option<ImageDimensions>) -> Option<f64> {
    let size = size.filter(|s| !s.is_empty())?;
    Some(round_to(
        vehicle_count as f64 / size.area() as f64 * 100_000.0,
        4,
    ))
}

/// Heuristic quality estimates; there is no ground truth behind them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatedMetrics {
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    #[serde(rename = "mAP")]
    pub map: Option<f64>,
}

impl EstimatedMetrics {
    /// Precision tracks mean confidence; recall decays slowly with crowding.
    pub fn estimate(mean_conf: Option<f64>, vehicle_count: Option<u64>) -> Self {
        let precision = mean_conf.map(|m| round_to(m, 3));
        let recall = vehicle_count
            .map(|n| round_to((0.9 - n as f64 / 1000.0).clamp(0.3, 0.99), 3));
        let map = match (precision, recall) {
            (Some(p), Some(r)) => Some(round_to((p + r) / 2.0, 3)),
            _ => None,
        };
        Self {
            precision,
            recall,
            map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_are_all_none() {
        let stats = ConfidenceStats::from_values(&[]);
        assert_eq!(stats, ConfidenceStats::default());
        assert!(stats.mean_conf.is_none() && stats.std_conf.is_none());
    }

    #[test]
    fn single_sample_has_zero_spread() {
        let stats = ConfidenceStats::from_values(&[0.7]);
        assert_eq!(stats.mean_conf, Some(0.7));
        assert_eq!(stats.median_conf, Some(0.7));
        assert_eq!(stats.std_conf, Some(0.0));
    }

    #[test]
    fn stats_use_population_deviation_and_even_median() {
        let stats = ConfidenceStats::from_values(&[0.9, 0.5, 0.7, 0.3]);
        assert_eq!(stats.mean_conf, Some(0.6));
        assert_eq!(stats.median_conf, Some(0.6));
        assert_eq!(stats.std_conf, Some(0.2236));
        assert_eq!(stats.min_conf, Some(0.3));
        assert_eq!(stats.max_conf, Some(0.9));
    }

    #[test]
    fn density_needs_a_known_area() {
        let size = ImageDimensions::new(1000, 500);
        assert_eq!(density_per_100k_px(10, Some(size)), Some(2.0));
        assert_eq!(density_per_100k_px(10, None), None);
        assert_eq!(density_per_100k_px(10, Some(ImageDimensions::new(0, 500))), None);
    }

    #[test]
    fn estimates_follow_confidence_and_count() {
        let est = EstimatedMetrics::estimate(Some(0.81), Some(42));
        assert_eq!(est.precision, Some(0.81));
        assert_eq!(est.recall, Some(0.858));
        assert_eq!(est.map, Some(0.834));

        let crowded = EstimatedMetrics::estimate(None, Some(900));
        assert_eq!(crowded.recall, Some(0.3));
        assert_eq!(crowded.map, None);

        assert_eq!(EstimatedMetrics::estimate(None, None), EstimatedMetrics::default());
    }
}
