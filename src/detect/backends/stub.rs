use anyhow::{anyhow, Result};
use std::path::Path;

use crate::detect::backend::{DetectParams, DetectorBackend};
use crate::detect::raw::RawDetection;

/// Stub backend for testing. Replays scripted detections or a scripted failure.
pub struct StubBackend {
    script: Script,
    calls: usize,
}

enum Script {
    Detections(Vec<RawDetection>),
    Failure(String),
}

impl StubBackend {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            script: Script::Detections(detections),
            calls: 0,
        }
    }

    /// Backend whose every `detect` call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Script::Failure(message.into()),
            calls: 0,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _image: &Path, params: &DetectParams) -> Result<Vec<RawDetection>> {
        self.calls += 1;
        match &self.script {
            Script::Failure(message) => Err(anyhow!("{}", message)),
            Script::Detections(detections) => Ok(detections
                .iter()
                .filter(|raw| match raw {
                    RawDetection::Keyed { confidence, .. } => {
                        confidence.unwrap_or(0.0) >= params.confidence as f64
                    }
                    RawDetection::Positional(values) => {
                        values.get(4).copied().flatten().unwrap_or(0.0)
                            >= params.confidence as f64
                    }
                })
                .cloned()
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CornerBox;

    #[test]
    fn stub_filters_by_confidence_and_counts_calls() {
        let mut backend = StubBackend::new(vec![
            RawDetection::corner(CornerBox::new(0.0, 0.0, 1.0, 1.0), 0.9, 0),
            RawDetection::corner(CornerBox::new(0.0, 0.0, 1.0, 1.0), 0.1, 0),
        ]);

        let out = backend
            .detect(Path::new("x.jpg"), &DetectParams::default())
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(backend.calls(), 1);
    }

    #[test]
    fn failing_stub_reports_error() {
        let mut backend = StubBackend::failing("engine missing");
        let err = backend
            .detect(Path::new("x.jpg"), &DetectParams::default())
            .unwrap_err();
        assert!(err.to_string().contains("engine missing"));
        assert_eq!(backend.calls(), 1);
    }
}
