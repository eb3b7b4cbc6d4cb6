use anyhow::Result;
use std::path::Path;

use super::raw::RawDetection;

pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Per-invocation detector parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectParams {
    /// Minimum confidence for a detection to be reported.
    pub confidence: f32,
    /// Square model input size in pixels.
    pub input_size: u32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

/// Detector backend trait.
///
/// A backend is an explicitly owned handle passed to the reconciler; there is
/// no process-wide model instance. `detect` may block for as long as
/// inference takes. Timeouts belong to the caller.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on the image at `image`.
    ///
    /// Boxes are reported in original-image corner pixels. An empty result is
    /// a valid answer; errors mean the detector could not run.
    fn detect(&mut self, image: &Path, params: &DetectParams) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
