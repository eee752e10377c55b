//! Detector adapter: one loaded model handle bound to one threshold value.
//!
//! The inference library only accepts `{max_results, score_threshold}` at
//! construction time, so a threshold change means the old adapter is
//! discarded and a new one is built. Each adapter carries a generation
//! number; the pipeline uses it to recognize a result produced by a
//! superseded handle and discard it instead of publishing.

use std::cmp::Ordering;

use image::RgbImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::backends::StubBackend;
use crate::detect::result::DetectionSet;
use crate::error::{InferenceError, ModelLoadError};

/// Model reference prefix handled by the deterministic stub backend.
pub const STUB_MODEL_SCHEME: &str = "stub://";

/// Construction-time detector configuration. Immutable for the lifetime of
/// the adapter instance built from it.
#[derive(Clone, Debug)]
pub struct DetectorOptions {
    /// Model reference: `stub://name` or a filesystem path to an ONNX
    /// artifact (requires the `backend-tract` feature).
    pub model: String,
    /// Result cap after filtering.
    pub max_results: usize,
    /// Minimum confidence for a detection to be retained.
    pub score_threshold: f32,
    /// Model input size, used by file-backed models.
    pub input_width: u32,
    pub input_height: u32,
    /// Optional labels file (one label per line), used by file-backed models.
    pub labels_path: Option<std::path::PathBuf>,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            model: "stub://detector".to_string(),
            max_results: 3,
            score_threshold: 0.6,
            input_width: 640,
            input_height: 480,
            labels_path: None,
        }
    }
}

/// A loaded, configured detector bound to one threshold value.
pub struct DetectorAdapter {
    backend: Box<dyn DetectorBackend>,
    options: DetectorOptions,
    generation: u64,
}

impl DetectorAdapter {
    /// Load the model named by `options`. Fails with `ModelLoadError` when
    /// the artifact is missing or incompatible; fatal, not retried.
    pub fn new(options: DetectorOptions) -> Result<Self, ModelLoadError> {
        Self::with_generation(options, 0)
    }

    pub(crate) fn with_generation(
        options: DetectorOptions,
        generation: u64,
    ) -> Result<Self, ModelLoadError> {
        if !(0.0..=1.0).contains(&options.score_threshold) {
            return Err(ModelLoadError::new(format!(
                "score threshold {} outside [0, 1]",
                options.score_threshold
            )));
        }
        if options.max_results == 0 {
            return Err(ModelLoadError::new("max_results must be at least 1"));
        }

        let backend = build_backend(&options)?;
        Ok(Self {
            backend,
            options,
            generation,
        })
    }

    /// Run inference synchronously on the calling thread. Detections come
    /// back sorted by descending top score, filtered to `score >=
    /// score_threshold`, truncated to `max_results`.
    pub fn detect(&self, image: &RgbImage) -> Result<DetectionSet, InferenceError> {
        let mut detections = self.backend.detect(image)?;

        for detection in &mut detections {
            detection
                .categories
                .sort_by(|a, b| compare_scores(b.score, a.score));
        }
        detections.retain(|d| d.top_score() >= self.options.score_threshold);
        detections.sort_by(|a, b| compare_scores(b.top_score(), a.top_score()));
        detections.truncate(self.options.max_results);

        Ok(DetectionSet::new(detections))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn score_threshold(&self) -> f32 {
        self.options.score_threshold
    }

    pub fn max_results(&self) -> usize {
        self.options.max_results
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

fn compare_scores(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn build_backend(options: &DetectorOptions) -> Result<Box<dyn DetectorBackend>, ModelLoadError> {
    if options.model.starts_with(STUB_MODEL_SCHEME) {
        return Ok(Box::new(StubBackend::new()));
    }

    #[cfg(feature = "backend-tract")]
    {
        let labels = match &options.labels_path {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| {
                    ModelLoadError::new(format!("read labels file {}: {e}", path.display()))
                })?
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect(),
            None => Vec::new(),
        };
        let backend = crate::detect::backends::TractBackend::new(
            &options.model,
            options.input_width,
            options.input_height,
            labels,
        )?;
        Ok(Box::new(backend))
    }

    #[cfg(not(feature = "backend-tract"))]
    Err(ModelLoadError::new(format!(
        "model '{}' requires the backend-tract feature",
        options.model
    )))
}
