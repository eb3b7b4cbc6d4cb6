//! Traffic Lens
//!
//! Data plumbing around a vehicle-detection model.
//!
//! # Architecture
//!
//! Two independent subsystems share the geometry primitives:
//!
//! 1. **Label normalizer** (`labels`): repairs raw per-image annotation
//!    files into canonical normalized center-box lines, deleting files that
//!    cannot be recovered and producing a fix report.
//! 2. **Detection reconciler** (`reconcile`): decides whether a persisted
//!    prior detection record or a fresh detector run describes an image,
//!    then derives vehicle count, confidence statistics, density, heuristic
//!    quality estimates and a congestion risk level into a metrics report.
//!
//! # Module Structure
//!
//! - `geometry`: normalized center boxes, pixel corner boxes, rounding
//! - `labels`: line/file/dataset repair and verification
//! - `detect`: detector backend trait, stub and ONNX backends, detection normalization
//! - `record`: prior detection record parsing
//! - `reconcile`: authority algorithm, statistics, risk, reports
//! - `config`: TOML + environment configuration for the binaries
//! - `fsutil`: atomic writes and modification times

pub mod config;
pub mod detect;
pub mod fsutil;
pub mod geometry;
pub mod labels;
pub mod record;
pub mod reconcile;

pub use config::ToolConfig;
pub use detect::{DetectParams, Detection, DetectorBackend, RawDetection, StubBackend};
pub use geometry::{BoundingBox, CornerBox, ImageDimensions};
pub use labels::{
    normalize_dataset, verify_dataset, DatasetLayout, FileStatus, FixOptions, FixReport,
    InferenceMode,
};
pub use record::PriorRecord;
pub use reconcile::{
    DetectionSource, MetricsReport, Reconciler, Reconciliation, RiskLevel,
};
