#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::density::DensityMap;
use crate::estimate::backend::DensityEstimator;
use crate::estimate::normalize::normalize_imagenet;
use crate::frame::Frame;

/// Tract-based backend for ONNX density networks.
///
/// The model takes one `1x3xHxW` ImageNet-normalised frame and returns a
/// `1x1xhxw` density map (`h x w` equal to or a fixed ratio of `H x W`).
pub struct TractEstimator {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
}

impl TractEstimator {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width != self.width || frame.height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width,
                frame.height,
                self.width,
                self.height
            ));
        }
        let chw = normalize_imagenet(frame);
        let input = tract_ndarray::Array4::from_shape_vec(
            (1, 3, self.height as usize, self.width as usize),
            chw,
        )
        .context("normalised frame does not match model input shape")?;
        Ok(input.into_tensor())
    }

    fn extract_density(&self, outputs: TVec<TValue>) -> Result<DensityMap> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        let (height, width) = match shape.as_slice() {
            [1, 1, h, w] | [1, h, w] | [h, w] => (*h, *w),
            other => return Err(anyhow!("unexpected density output shape {:?}", other)),
        };
        let values: Vec<f32> = view.iter().map(|v| v.max(0.0)).collect();
        DensityMap::from_vec(height, width, values)
    }
}

impl DensityEstimator for TractEstimator {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn estimate(&self, frame: &Frame) -> Result<DensityMap> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_density(outputs)
    }
}
