//! Error taxonomy for the detection pipeline.
//!
//! Three kinds of failure, with different blast radii:
//!
//! - `DecodeError`: a single frame could not be converted. Recoverable; the
//!   pipeline drops the frame and keeps going.
//! - `ModelLoadError`: the detector could not be built. Fatal for detection;
//!   no `DetectionSet` is published until a rebuild succeeds, and the error
//!   stays visible through the session controller.
//! - `InferenceError`: a single `detect` call failed. Recoverable; the frame
//!   is dropped and the pipeline keeps going.

use thiserror::Error;

/// A camera frame could not be converted into a bitmap.
#[derive(Debug, Error)]
#[error("frame decode failed: {0}")]
pub struct DecodeError(pub String);

/// The detection model could not be loaded or configured.
#[derive(Debug, Error)]
#[error("model load failed: {0}")]
pub struct ModelLoadError(pub String);

/// Inference failed unexpectedly on an otherwise valid bitmap.
#[derive(Debug, Error)]
#[error("inference failed: {0}")]
pub struct InferenceError(pub String);

impl DecodeError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl ModelLoadError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl InferenceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
