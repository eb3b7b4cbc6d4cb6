//! Detector capability and detection normalization.
//!
//! - `backend`: the `DetectorBackend` trait the reconciler is handed
//! - `raw`: tagged raw detections and their normalization
//! - `result`: the canonical `Detection`
//! - `postprocess`: letterbox mapping and NMS for YOLO-style outputs

mod backend;
mod backends;
pub mod postprocess;
pub mod raw;
mod result;

pub use backend::{DetectParams, DetectorBackend, DEFAULT_CONFIDENCE, DEFAULT_INPUT_SIZE};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use raw::{normalize_all, normalize_values, RawDetection};
pub use result::Detection;
