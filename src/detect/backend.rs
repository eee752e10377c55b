use image::RgbImage;

use crate::detect::result::Detection;
use crate::error::InferenceError;

/// Detector backend trait.
///
/// A backend owns one loaded model and runs inference synchronously on the
/// calling thread. Construction is the only configuration point; a backend
/// instance is immutable for its lifetime, which is what forces the adapter
/// rebuild when the score threshold changes.
///
/// Backends report raw candidates; score filtering, ordering, and the result
/// cap are applied by `DetectorAdapter` so the contract holds for every
/// backend.
pub trait DetectorBackend: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a bitmap. No side effects beyond transient compute.
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError>;
}
