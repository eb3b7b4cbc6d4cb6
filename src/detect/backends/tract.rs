#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectParams, DetectorBackend};
use crate::detect::postprocess::{non_max_suppression, Candidate, Letterbox, DEFAULT_IOU_THRESHOLD, PAD_VALUE};
use crate::detect::raw::RawDetection;
use crate::geometry::ImageDimensions;

/// Tract-based backend for YOLOv8-style ONNX detectors.
///
/// The model must take a `[1, 3, S, S]` RGB input and produce a
/// `[1, 4 + classes, anchors]` output of center-form boxes followed by
/// per-class scores.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    iou_threshold: f64,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for `input_size` inputs.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        })
    }

    fn build_input(&self, image: &Path) -> Result<(Tensor, Letterbox)> {
        let rgb = image::open(image)
            .with_context(|| format!("failed to decode {}", image.display()))?
            .to_rgb8();
        let letterbox = Letterbox::new(
            ImageDimensions::new(rgb.width(), rgb.height()),
            self.input_size,
        );
        let resized = imageops::resize(
            &rgb,
            letterbox.resized.width,
            letterbox.resized.height,
            FilterType::Triangle,
        );
        let mut canvas = RgbImage::from_pixel(
            self.input_size,
            self.input_size,
            Rgb([PAD_VALUE, PAD_VALUE, PAD_VALUE]),
        );
        imageops::overlay(
            &mut canvas,
            &resized,
            letterbox.pad_x as i64,
            letterbox.pad_y as i64,
        );

        let side = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok((input.into_tensor(), letterbox))
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        letterbox: &Letterbox,
        params: &DetectParams,
    ) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [1, 4 + classes, anchors]")?;
        let (features, anchors) = (view.shape()[1], view.shape()[2]);
        if features < 5 {
            return Err(anyhow!("model output has {} features, need at least 5", features));
        }

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let (class_id, score) = (4..features)
                .map(|f| (f - 4, view[[0, f, a]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
            if score < params.confidence {
                continue;
            }
            let bbox = letterbox.to_original(
                view[[0, 0, a]] as f64,
                view[[0, 1, a]] as f64,
                view[[0, 2, a]] as f64,
                view[[0, 3, a]] as f64,
            );
            candidates.push(Candidate {
                bbox,
                score: score as f64,
                class_id: class_id as i64,
            });
        }

        Ok(non_max_suppression(candidates, self.iou_threshold)
            .into_iter()
            .map(|c| RawDetection::corner(c.bbox, c.score, c.class_id))
            .collect())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, image: &Path, params: &DetectParams) -> Result<Vec<RawDetection>> {
        if params.input_size != self.input_size {
            return Err(anyhow!(
                "requested input size {} does not match loaded model input {}",
                params.input_size,
                self.input_size
            ));
        }
        let (input, letterbox) = self.build_input(image)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let detections = self.decode(outputs, &letterbox, params)?;
        log::debug!(
            "tract: {} detections on {}",
            detections.len(),
            image.display()
        );
        Ok(detections)
    }
}
