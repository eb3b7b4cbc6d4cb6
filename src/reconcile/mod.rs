//! Detection reconciler.
//!
//! Decides which detections describe an image: the persisted prior record or
//! a fresh detector run. Then derives count, statistics, risk and the
//! metrics report from the winning set.

pub mod placeholder;
pub mod report;
pub mod risk;
pub mod stats;
pub mod target;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::detect::{normalize_all, normalize_values, DetectParams, DetectorBackend, Detection};
use crate::fsutil::modified_epoch_s;
use crate::labels::dataset::read_image_dimensions;
use crate::record::PriorRecord;

pub use placeholder::{write_placeholder, PlaceholderMetrics, PlaceholderOutcome};
pub use report::{ImageRef, MetricsReport, DEFAULT_PUBLIC_PREFIX};
pub use risk::{IotAction, ProximityAlert, RecommendedAction, RiskLevel};
pub use stats::{ConfidenceStats, EstimatedMetrics};
pub use target::{select_target, Target, TargetSource};

/// Which detection set ended up in the report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionSource {
    /// Detections from the prior record.
    Prior,
    /// Detections from a detector run during this reconciliation.
    Fresh,
    /// No detector output and no usable prior record.
    Empty,
}

impl DetectionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionSource::Prior => "prior",
            DetectionSource::Fresh => "fresh",
            DetectionSource::Empty => "empty",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reconciliation {
    pub report: MetricsReport,
    pub source: DetectionSource,
    pub detector_invoked: bool,
}

pub struct Reconciler {
    detector: Option<Box<dyn DetectorBackend>>,
    params: DetectParams,
    results_dir: PathBuf,
    public_prefix: String,
}

impl Reconciler {
    /// Reconciler without a detector; it can only reuse prior records.
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            detector: None,
            params: DetectParams::default(),
            results_dir: results_dir.into(),
            public_prefix: DEFAULT_PUBLIC_PREFIX.to_string(),
        }
    }

    pub fn with_detector(mut self, detector: Box<dyn DetectorBackend>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_params(mut self, params: DetectParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.public_prefix = prefix.into();
        self
    }

    pub fn detector_name(&self) -> Option<&'static str> {
        self.detector.as_ref().map(|d| d.name())
    }

    pub fn reconcile(&mut self, image: &Path, prior: Option<&PriorRecord>) -> Reconciliation {
        self.reconcile_at(image, prior, Utc::now())
    }

    /// Reconcile with an explicit generation time.
    pub fn reconcile_at(
        &mut self,
        image: &Path,
        prior: Option<&PriorRecord>,
        now: DateTime<Utc>,
    ) -> Reconciliation {
        let image_ref = ImageRef::new(image, &self.results_dir, &self.public_prefix);
        let matching = prior.filter(|record| record.refers_to(&image_ref.name));
        let prior_detections = matching.and_then(PriorRecord::usable_detections);

        let stale = match prior_detections {
            None => true,
            Some(_) => is_stale(image, matching.and_then(|r| r.timestamp)),
        };

        let mut detector_invoked = false;
        let mut fresh: Option<Vec<Detection>> = None;
        if stale {
            if let Some(detector) = self.detector.as_mut() {
                detector_invoked = true;
                log::info!("running {} detector on {}", detector.name(), image.display());
                match detector.detect(image, &self.params) {
                    Ok(raw) => fresh = Some(normalize_all(&raw)),
                    Err(err) => log::warn!(
                        "detector {} failed on {}: {:#}",
                        detector.name(),
                        image.display(),
                        err
                    ),
                }
            } else {
                log::debug!("no detector available; skipping re-run for {}", image.display());
            }
        }

        let (source, detections) = match (fresh, prior_detections) {
            (Some(detections), _) => (DetectionSource::Fresh, detections),
            (None, Some(values)) => (DetectionSource::Prior, normalize_values(values)),
            (None, None) => (DetectionSource::Empty, Vec::new()),
        };

        let vehicle_count = matching
            .and_then(|record| record.vehicle_count)
            .unwrap_or(detections.len() as u64);

        let report = MetricsReport::assemble(
            image_ref,
            vehicle_count,
            detections,
            read_image_dimensions(image),
            prior.map(|record| record.raw.clone()),
            now,
        );
        log::info!(
            "{}: {} vehicles ({} detections, source {}), risk {}",
            report.image.name,
            report.vehicle_count,
            report.detections.len(),
            source.as_str(),
            report.risk_level
        );

        Reconciliation {
            report,
            source,
            detector_invoked,
        }
    }
}

/// True when the image changed after the record was written.
///
/// A record without a timestamp is always older. An image whose
/// modification time cannot be read is treated as unchanged.
fn is_stale(image: &Path, record_ts: Option<i64>) -> bool {
    match modified_epoch_s(image) {
        None => false,
        Some(mtime) => record_ts.map_or(true, |ts| mtime > ts),
    }
}
