#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::config::DetectorSettings;
use crate::detect::backend::DetectorBackend;
use crate::detect::postprocess::{decode_yolo, letterbox_input, DecodeParams, Letterbox};
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Tract-based backend for YOLOv8-style ONNX detectors.
///
/// Loads a local model file once and runs it on letterboxed RGB frames.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    params: DecodeParams,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for a square input of `input_size`.
    pub fn new<P: AsRef<Path>>(model_path: P, settings: &DetectorSettings) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = settings.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({}x{} input)",
            model_path.display(),
            size,
            size
        );

        Ok(Self {
            model,
            input_size: settings.input_size,
            params: DecodeParams {
                confidence_threshold: settings.confidence_threshold,
                iou_threshold: settings.iou_threshold,
                max_detections: settings.max_detections,
            },
        })
    }

    fn build_input(&self, frame: &Frame, letterbox: &Letterbox) -> Result<Tensor> {
        let size = self.input_size as usize;
        let data = letterbox_input(frame, letterbox)?;
        let input = tract_ndarray::Array4::from_shape_vec((1, 3, size, size), data)
            .context("input tensor shape")?;
        Ok(input.into_tensor())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let letterbox = Letterbox::fit(frame.width, frame.height, self.input_size);
        let input = self.build_input(frame, &letterbox)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let values = output
            .as_slice::<f32>()
            .context("model output tensor was not f32")?;

        decode_yolo(
            values,
            output.shape(),
            &letterbox,
            frame.width,
            frame.height,
            &self.params,
        )
    }

    fn warm_up(&mut self) -> Result<()> {
        let size = self.input_size as usize;
        let blank = Tensor::zero::<f32>(&[1, 3, size, size]).context("warm-up tensor")?;
        self.model
            .run(tvec!(blank.into()))
            .context("ONNX warm-up inference failed")?;
        Ok(())
    }
}
