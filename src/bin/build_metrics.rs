//! build_metrics - Write a per-image metrics report.
//!
//! Picks the image to describe (explicit `--image`, the last detection
//! record's image, or the newest `annotated_*.jpg`), reconciles the last
//! detection record with an optional fresh detector run and writes
//! `metrics_detailed.json` into the results directory.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use traffic_lens::config::{BackendKind, DetectorSettings, ToolConfig};
use traffic_lens::detect::{DetectParams, DetectorBackend};
use traffic_lens::reconcile::{select_target, ProximityAlert, Reconciler};
use traffic_lens::record::PriorRecord;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "build_metrics",
    about = "Reconcile the last detection with the latest image and write a metrics report"
)]
struct Args {
    /// Image to analyze (overrides the last detection record)
    #[arg(short, long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// ONNX weights for a fresh detector run (implies --backend tract)
    #[arg(short, long, value_name = "PATH")]
    weights: Option<PathBuf>,

    /// Detector backend (none|tract)
    #[arg(long, value_name = "NAME")]
    backend: Option<String>,

    /// Minimum detection confidence for fresh runs
    #[arg(long)]
    confidence: Option<f32>,

    /// Directory holding annotated images and detection records
    #[arg(long, value_name = "DIR")]
    results_dir: Option<PathBuf>,

    /// Also print the proximity alert for a range reading in centimetres
    #[arg(long, value_name = "CM", allow_negative_numbers = true)]
    distance: Option<f64>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut cfg = ToolConfig::load()?;
    if let Some(dir) = args.results_dir {
        cfg.metrics.results_dir = dir;
    }
    if let Some(backend) = args.backend.as_deref() {
        cfg.detector.backend = backend.parse()?;
    }
    if let Some(weights) = args.weights {
        cfg.detector.model_path = Some(weights);
        cfg.detector.backend = BackendKind::Tract;
    }
    if let Some(confidence) = args.confidence {
        cfg.detector.confidence = confidence;
    }
    cfg.validate()?;

    if let Some(distance) = args.distance {
        let alert = ProximityAlert::from_distance(Some(distance));
        println!("{}", serde_json::to_string(&alert)?);
    }

    let prior = {
        let _stage = ui.stage("Read last detection record");
        PriorRecord::load(&cfg.metrics.last_detection_path())
    };

    let target = {
        let _stage = ui.stage("Select target image");
        select_target(args.image.as_deref(), prior.as_ref(), &cfg.metrics.results_dir)?
    };
    let Some(target) = target else {
        println!(
            "No image to analyze. Place an annotated_*.jpg in {} or pass --image.",
            cfg.metrics.results_dir.display()
        );
        return Ok(());
    };
    log::info!("target {} ({:?})", target.path.display(), target.source);

    let detector = {
        let _stage = ui.stage("Prepare detector");
        build_detector(&cfg.detector)
    };
    let mut reconciler = Reconciler::new(&cfg.metrics.results_dir)
        .with_params(DetectParams {
            confidence: cfg.detector.confidence,
            input_size: cfg.detector.input_size,
        })
        .with_public_prefix(cfg.metrics.public_prefix.clone());
    if let Some(detector) = detector {
        reconciler = reconciler.with_detector(detector);
    }
    log::info!("detector: {}", reconciler.detector_name().unwrap_or("none"));

    let result = {
        let _stage = ui.stage("Reconcile detections");
        reconciler.reconcile(&target.path, prior.as_ref())
    };

    let output = cfg.metrics.output_path();
    {
        let _stage = ui.stage("Write metrics report");
        result.report.write(&output)?;
    }

    println!("Metrics created for: {}", result.report.image.name);
    println!(
        "vehicles: {}  risk: {}  action: {}  source: {}",
        result.report.vehicle_count,
        result.report.risk_level,
        result.report.recommended_iot_action.message,
        result.source.as_str()
    );
    println!("Wrote {}", output.display());
    Ok(())
}

/// A missing or unloadable detector degrades to reusing the prior record.
fn build_detector(settings: &DetectorSettings) -> Option<Box<dyn DetectorBackend>> {
    match settings.backend {
        BackendKind::None => None,
        BackendKind::Tract => match tract_detector(settings) {
            Ok(detector) => Some(detector),
            Err(err) => {
                log::warn!("detector unavailable, continuing without fresh runs: {:#}", err);
                None
            }
        },
    }
}

#[cfg(feature = "backend-tract")]
fn tract_detector(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    use anyhow::anyhow;
    use traffic_lens::detect::TractBackend;

    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("no model path configured"))?;
    let mut backend = TractBackend::new(model_path, settings.input_size)?;
    backend.warm_up()?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn tract_detector(_settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow::anyhow!(
        "this build does not include the tract backend (enable feature backend-tract)"
    ))
}
