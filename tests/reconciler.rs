use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use serde_json::{json, Value};

use traffic_lens::detect::{DetectParams, RawDetection, StubBackend};
use traffic_lens::geometry::CornerBox;
use traffic_lens::reconcile::{
    select_target, DetectionSource, IotAction, Reconciler, RiskLevel, TargetSource,
};
use traffic_lens::record::PriorRecord;

fn annotated_image(dir: &Path, name: &str, mtime: u64) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::new(1280, 720).save(&path).unwrap();
    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(UNIX_EPOCH + Duration::from_secs(mtime))
        .unwrap();
    path
}

fn scripted_detector(count: usize, confidence: f64) -> Box<StubBackend> {
    let detections = (0..count)
        .map(|i| {
            let x = (i % 20) as f64 * 60.0;
            let y = (i / 20) as f64 * 60.0;
            RawDetection::corner(CornerBox::new(x, y, x + 40.0, y + 30.0), confidence, 0)
        })
        .collect();
    Box::new(StubBackend::new(detections))
}

fn record(value: Value) -> PriorRecord {
    PriorRecord::from_value(value).unwrap()
}

#[test]
fn crowded_fresh_run_is_high_risk() {
    let dir = tempfile::tempdir().unwrap();
    let image = annotated_image(dir.path(), "annotated_2.jpg", 5_000);
    let prior = record(json!({
        "output_image": "/static/results/annotated_1.jpg",
        "vehicle_count": 7,
        "detections": [[0, 0, 10, 10, 0.9, 0]],
        "timestamp": 1_000,
    }));

    let mut reconciler = Reconciler::new(dir.path()).with_detector(scripted_detector(42, 0.81));
    assert_eq!(reconciler.detector_name(), Some("stub"));
    let result = reconciler.reconcile(&image, Some(&prior));
    let report = &result.report;

    assert_eq!(result.source, DetectionSource::Fresh);
    assert!(result.detector_invoked);
    assert_eq!(report.vehicle_count, 42);
    assert_eq!(report.detections.len(), 42);
    assert_eq!(report.risk_level, RiskLevel::High);
    assert_eq!(report.recommended_iot_action.action, IotAction::RerouteOrStop);
    assert_eq!(report.estimated_metrics.precision, Some(0.81));
    assert_eq!(report.estimated_metrics.recall, Some(0.858));
    assert_eq!(report.estimated_metrics.map, Some(0.834));
    assert_eq!(report.confidence_stats.std_conf, Some(0.0));
    assert_eq!(report.density_per_100k_px, Some(4.5573));
    assert_eq!(report.image.relative, "/static/results/annotated_2.jpg");
    assert_eq!(report.source_last_detection.as_ref(), Some(&prior.raw));
}

#[test]
fn prior_count_for_another_image_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let image = annotated_image(dir.path(), "annotated_2.jpg", 5_000);
    let prior = record(json!({
        "image_name": "annotated_1.jpg",
        "vehicle_count": 99,
        "detections": [[0, 0, 10, 10, 0.9, 0]],
        "timestamp": 9_000,
    }));

    let mut reconciler = Reconciler::new(dir.path()).with_detector(scripted_detector(3, 0.6));
    let result = reconciler.reconcile(&image, Some(&prior));

    assert_eq!(result.source, DetectionSource::Fresh);
    assert_eq!(result.report.vehicle_count, 3);
    assert_eq!(result.report.risk_level, RiskLevel::Low);
}

#[test]
fn matching_prior_count_wins_over_detection_length() {
    let dir = tempfile::tempdir().unwrap();
    let image = annotated_image(dir.path(), "annotated_1.jpg", 1_000);
    let prior = record(json!({
        "output_image": "/static/results/annotated_1.jpg",
        "vehicle_count": 17,
        "detections": [
            {"bbox": [0, 0, 10, 10], "conf": 0.9, "cls": 0},
            {"xyxy": [20, 20, 40, 40], "score": 0.7},
        ],
        "timestamp": "1970-01-01T00:33:20Z",
    }));

    let mut reconciler = Reconciler::new(dir.path()).with_detector(scripted_detector(5, 0.9));
    let result = reconciler.reconcile(&image, Some(&prior));

    assert_eq!(result.source, DetectionSource::Prior);
    assert!(!result.detector_invoked);
    assert_eq!(result.report.detections.len(), 2);
    assert_eq!(result.report.vehicle_count, 17);
    assert_eq!(result.report.risk_level, RiskLevel::Medium);
    assert_eq!(result.report.confidence_stats.mean_conf, Some(0.8));
}

#[test]
fn without_detector_or_prior_the_report_is_empty_but_complete() {
    let dir = tempfile::tempdir().unwrap();
    let image = annotated_image(dir.path(), "annotated_1.jpg", 1_000);

    let mut reconciler = Reconciler::new(dir.path());
    assert_eq!(reconciler.detector_name(), None);
    let result = reconciler.reconcile(&image, None);
    let output = dir.path().join("metrics_detailed.json");
    result.report.write(&output).unwrap();

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(result.source, DetectionSource::Empty);
    assert_eq!(written["vehicle_count"], json!(0));
    assert_eq!(written["detections"], json!([]));
    assert_eq!(written["confidence_stats"]["mean_conf"], Value::Null);
    assert_eq!(written["image_size"], json!({"width": 1280, "height": 720}));
    assert_eq!(written["density_per_100k_px"], json!(0.0));
    assert_eq!(written["estimated_metrics"]["precision"], Value::Null);
    assert_eq!(written["estimated_metrics"]["recall"], json!(0.9));
    assert_eq!(written["risk_level"], json!("low"));
    assert_eq!(written["source_last_detection"], Value::Null);
}

#[test]
fn detector_confidence_threshold_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let image = annotated_image(dir.path(), "annotated_1.jpg", 1_000);
    let detector = Box::new(StubBackend::new(vec![
        RawDetection::corner(CornerBox::new(0.0, 0.0, 10.0, 10.0), 0.9, 0),
        RawDetection::corner(CornerBox::new(20.0, 0.0, 30.0, 10.0), 0.3, 0),
    ]));

    let mut reconciler = Reconciler::new(dir.path())
        .with_detector(detector)
        .with_params(DetectParams {
            confidence: 0.5,
            ..DetectParams::default()
        });
    let result = reconciler.reconcile(&image, None);

    assert_eq!(result.report.vehicle_count, 1);
}

#[test]
fn target_selection_feeds_the_reconciler() {
    let dir = tempfile::tempdir().unwrap();
    annotated_image(dir.path(), "annotated_1.jpg", 1_000);
    annotated_image(dir.path(), "annotated_2.jpg", 8_000);
    let prior = record(json!({
        "output_image": "/static/results/annotated_1.jpg",
        "vehicle_count": 4,
        "detections": [[0, 0, 10, 10, 0.9, 0]],
        "timestamp": 2_000,
    }));

    let target = select_target(None, Some(&prior), dir.path()).unwrap().unwrap();
    assert_eq!(target.source, TargetSource::LatestAnnotated);
    assert_eq!(target.path, dir.path().join("annotated_2.jpg"));

    let mut reconciler = Reconciler::new(dir.path());
    let result = reconciler.reconcile(&target.path, Some(&prior));

    assert_eq!(result.source, DetectionSource::Empty);
    assert_eq!(result.report.vehicle_count, 0);
    assert_eq!(result.report.image.name, "annotated_2.jpg");
}
