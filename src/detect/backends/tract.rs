#![cfg(feature = "backend-tract")]

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Category, Detection};
use crate::error::{InferenceError, ModelLoadError};

/// Tract-based backend for ONNX detection models.
///
/// Loads a local model file with a fixed input size and decodes a
/// `[1, N, 6]` output layout (x1, y1, x2, y2, score, class) in model-input
/// pixel coordinates. Bitmaps are resized to the model input on the way in
/// and boxes are scaled back to bitmap coordinates on the way out.
pub struct TractBackend {
    plan: TypedSimplePlan<TypedModel>,
    input_width: u32,
    input_height: u32,
    labels: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        input_width: u32,
        input_height: u32,
        labels: Vec<String>,
    ) -> Result<Self, ModelLoadError> {
        let model_path = model_path.as_ref();
        if !model_path.is_file() {
            return Err(ModelLoadError::new(format!(
                "model artifact not found: {}",
                model_path.display()
            )));
        }

        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| {
                ModelLoadError::new(format!("load ONNX model {}: {e}", model_path.display()))
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .map_err(|e| ModelLoadError::new(format!("set input fact: {e}")))?
            .into_optimized()
            .map_err(|e| ModelLoadError::new(format!("optimize ONNX model: {e}")))?
            .into_runnable()
            .map_err(|e| ModelLoadError::new(format!("build runnable ONNX model: {e}")))?;

        Ok(Self {
            plan,
            input_width,
            input_height,
            labels,
        })
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let resized = if image.dimensions() == (self.input_width, self.input_height) {
            image.clone()
        } else {
            image::imageops::resize(
                image,
                self.input_width,
                self.input_height,
                FilterType::Triangle,
            )
        };

        let width = self.input_width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, width),
            |(_, channel, y, x)| {
                let pixel = resized.get_pixel(x as u32, y as u32);
                pixel.0[channel] as f32 / 255.0
            },
        );
        input.into_tensor()
    }

    fn label_for(&self, class: usize) -> String {
        self.labels
            .get(class)
            .cloned()
            .unwrap_or_else(|| format!("class_{class}"))
    }

    fn decode_output(
        &self,
        outputs: TVec<TValue>,
        bitmap_width: u32,
        bitmap_height: u32,
    ) -> Result<Vec<Detection>, InferenceError> {
        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::new("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::new(format!("model output was not f32: {e}")))?;
        let values: Vec<f32> = view.iter().copied().collect();
        if values.len() % 6 != 0 {
            return Err(InferenceError::new(format!(
                "unexpected output length {} (want rows of 6)",
                values.len()
            )));
        }

        let scale_x = bitmap_width as f32 / self.input_width as f32;
        let scale_y = bitmap_height as f32 / self.input_height as f32;
        let mut detections = Vec::new();
        for row in values.chunks_exact(6) {
            let [x1, y1, x2, y2, score, class] = [row[0], row[1], row[2], row[3], row[4], row[5]];
            if !score.is_finite() || score <= 0.0 {
                continue;
            }
            let label = self.label_for(class.max(0.0) as usize);
            detections.push(Detection {
                bounding_box: BoundingBox::new(
                    x1 * scale_x,
                    y1 * scale_y,
                    x2 * scale_x,
                    y2 * scale_y,
                ),
                categories: vec![Category::new(label, score.min(1.0))],
            });
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError> {
        let input = self.build_input(image);
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::new(format!("ONNX inference: {e}")))?;
        let (width, height) = image.dimensions();
        self.decode_output(outputs, width, height)
    }
}
