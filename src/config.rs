use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::detect::{DEFAULT_CONFIDENCE, DEFAULT_INPUT_SIZE};
use crate::labels::dataset::{DEFAULT_DETAIL_LIMIT, DEFAULT_SPLITS};
use crate::labels::InferenceMode;
use crate::reconcile::DEFAULT_PUBLIC_PREFIX;

const DEFAULT_DATASET_ROOT: &str = "dataset";
const DEFAULT_NUM_CLASSES: u32 = 1;
const DEFAULT_REPORT_PATH: &str = "fix_report.txt";
const DEFAULT_RESULTS_DIR: &str = "static/results";
const DEFAULT_LAST_DETECTION: &str = "last_detection.json";
const DEFAULT_METRICS_OUTPUT: &str = "metrics_detailed.json";
const DEFAULT_PLACEHOLDER: &str = "metrics.json";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ToolConfigFile {
    dataset: Option<DatasetConfigFile>,
    metrics: Option<MetricsConfigFile>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DatasetConfigFile {
    root: Option<PathBuf>,
    splits: Option<Vec<String>>,
    num_classes: Option<u32>,
    strict: Option<bool>,
    dry_run: Option<bool>,
    report_path: Option<PathBuf>,
    report_detail_limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MetricsConfigFile {
    results_dir: Option<PathBuf>,
    last_detection: Option<String>,
    output: Option<String>,
    placeholder: Option<String>,
    public_prefix: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<BackendKind>,
    model_path: Option<PathBuf>,
    confidence: Option<f32>,
    input_size: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub dataset: DatasetSettings,
    pub metrics: MetricsSettings,
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone)]
pub struct DatasetSettings {
    pub root: PathBuf,
    pub splits: Vec<String>,
    pub num_classes: u32,
    pub strict: bool,
    pub dry_run: bool,
    pub report_path: PathBuf,
    pub report_detail_limit: usize,
}

impl DatasetSettings {
    pub fn inference_mode(&self) -> InferenceMode {
        if self.strict {
            InferenceMode::Strict
        } else {
            InferenceMode::BestGuess
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSettings {
    pub results_dir: PathBuf,
    /// File names inside `results_dir`.
    pub last_detection: String,
    pub output: String,
    pub placeholder: String,
    pub public_prefix: String,
}

impl MetricsSettings {
    pub fn last_detection_path(&self) -> PathBuf {
        self.results_dir.join(&self.last_detection)
    }

    pub fn output_path(&self) -> PathBuf {
        self.results_dir.join(&self.output)
    }

    pub fn placeholder_path(&self) -> PathBuf {
        self.results_dir.join(&self.placeholder)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    None,
    Tract,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(BackendKind::None),
            "tract" => Ok(BackendKind::Tract),
            other => Err(anyhow!("unknown detector backend {:?} (expected none|tract)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: BackendKind,
    pub model_path: Option<PathBuf>,
    pub confidence: f32,
    pub input_size: u32,
}

impl ToolConfig {
    /// Defaults, then the file named by `TRAFFIC_LENS_CONFIG`, then
    /// `TRAFFIC_LENS_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TRAFFIC_LENS_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ToolConfigFile) -> Self {
        let dataset = file.dataset.unwrap_or_default();
        let metrics = file.metrics.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        Self {
            dataset: DatasetSettings {
                root: dataset
                    .root
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET_ROOT)),
                splits: dataset
                    .splits
                    .unwrap_or_else(|| DEFAULT_SPLITS.iter().map(|s| s.to_string()).collect()),
                num_classes: dataset.num_classes.unwrap_or(DEFAULT_NUM_CLASSES),
                strict: dataset.strict.unwrap_or(false),
                dry_run: dataset.dry_run.unwrap_or(false),
                report_path: dataset
                    .report_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH)),
                report_detail_limit: dataset.report_detail_limit.unwrap_or(DEFAULT_DETAIL_LIMIT),
            },
            metrics: MetricsSettings {
                results_dir: metrics
                    .results_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR)),
                last_detection: metrics
                    .last_detection
                    .unwrap_or_else(|| DEFAULT_LAST_DETECTION.to_string()),
                output: metrics
                    .output
                    .unwrap_or_else(|| DEFAULT_METRICS_OUTPUT.to_string()),
                placeholder: metrics
                    .placeholder
                    .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string()),
                public_prefix: metrics
                    .public_prefix
                    .unwrap_or_else(|| DEFAULT_PUBLIC_PREFIX.to_string()),
            },
            detector: DetectorSettings {
                backend: detector.backend.unwrap_or(BackendKind::None),
                model_path: detector.model_path,
                confidence: detector.confidence.unwrap_or(DEFAULT_CONFIDENCE),
                input_size: detector.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(root) = std::env::var("TRAFFIC_LENS_DATASET_ROOT") {
            if !root.trim().is_empty() {
                self.dataset.root = PathBuf::from(root);
            }
        }
        if let Ok(splits) = std::env::var("TRAFFIC_LENS_SPLITS") {
            let parsed = split_csv(&splits);
            if !parsed.is_empty() {
                self.dataset.splits = parsed;
            }
        }
        if let Ok(num_classes) = std::env::var("TRAFFIC_LENS_NUM_CLASSES") {
            self.dataset.num_classes = num_classes.trim().parse().map_err(|_| {
                anyhow!("TRAFFIC_LENS_NUM_CLASSES must be a positive integer")
            })?;
        }
        if let Ok(strict) = std::env::var("TRAFFIC_LENS_STRICT") {
            self.dataset.strict = parse_flag(&strict)
                .ok_or_else(|| anyhow!("TRAFFIC_LENS_STRICT must be true or false"))?;
        }
        if let Ok(dir) = std::env::var("TRAFFIC_LENS_RESULTS_DIR") {
            if !dir.trim().is_empty() {
                self.metrics.results_dir = PathBuf::from(dir);
            }
        }
        if let Ok(path) = std::env::var("TRAFFIC_LENS_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(confidence) = std::env::var("TRAFFIC_LENS_CONFIDENCE") {
            self.detector.confidence = confidence.trim().parse().map_err(|_| {
                anyhow!("TRAFFIC_LENS_CONFIDENCE must be a number in (0, 1]")
            })?;
        }
        Ok(())
    }

    /// Check ranges. Called by `load`; call again after applying CLI flags.
    pub fn validate(&mut self) -> Result<()> {
        if self.dataset.num_classes == 0 {
            return Err(anyhow!("dataset.num_classes must be at least 1"));
        }
        if self.dataset.splits.is_empty() {
            return Err(anyhow!("dataset.splits must name at least one split"));
        }
        let confidence = self.detector.confidence;
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(anyhow!(
                "detector.confidence must be in (0, 1], got {}",
                confidence
            ));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector.input_size must be greater than zero"));
        }
        if self.detector.backend == BackendKind::Tract && self.detector.model_path.is_none() {
            return Err(anyhow!("detector.model_path is required for the tract backend"));
        }
        if !self.metrics.public_prefix.ends_with('/') {
            self.metrics.public_prefix.push('/');
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ToolConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let mut cfg = ToolConfig::from_file(ToolConfigFile::default());
        cfg.validate().unwrap();
        assert_eq!(cfg.dataset.splits, vec!["train", "val", "test"]);
        assert_eq!(cfg.dataset.num_classes, 1);
        assert_eq!(cfg.detector.backend, BackendKind::None);
        assert_eq!(
            cfg.metrics.last_detection_path(),
            PathBuf::from("static/results/last_detection.json")
        );
    }

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!("Tract".parse::<BackendKind>().unwrap(), BackendKind::Tract);
        assert_eq!("none".parse::<BackendKind>().unwrap(), BackendKind::None);
        assert!("ultralytics".parse::<BackendKind>().is_err());
    }

    #[test]
    fn flags_and_csv() {
        assert_eq!(parse_flag("YES"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(split_csv(" train, ,val "), vec!["train", "val"]);
    }

    #[test]
    fn public_prefix_gains_a_trailing_slash() {
        let mut cfg = ToolConfig::from_file(ToolConfigFile::default());
        cfg.metrics.public_prefix = "/media".into();
        cfg.validate().unwrap();
        assert_eq!(cfg.metrics.public_prefix, "/media/");
    }
}
