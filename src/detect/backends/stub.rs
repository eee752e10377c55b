use image::RgbImage;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Category, Detection};
use crate::error::InferenceError;

const LABELS: [&str; 5] = ["person", "dog", "cat", "car", "bicycle"];

/// Stub backend for `stub://` model references.
///
/// Derives up to three deterministic detections from a hash of the pixel
/// content, so identical bitmaps always produce identical detections. Used
/// by tests and the demo daemon; stands in for the bundled model artifact.
pub struct StubBackend;

impl StubBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError> {
        let digest: [u8; 32] = Sha256::digest(image.as_raw()).into();
        let (width, height) = image.dimensions();
        let (w, h) = (width as f32, height as f32);

        let count = (digest[0] % 4) as usize;
        let mut detections = Vec::with_capacity(count);
        for i in 0..count {
            let b = &digest[1 + i * 8..1 + i * 8 + 8];
            let left = b[0] as f32 / 255.0 * w * 0.6;
            let top = b[1] as f32 / 255.0 * h * 0.6;
            let box_w = w * 0.1 + b[2] as f32 / 255.0 * w * 0.3;
            let box_h = h * 0.1 + b[3] as f32 / 255.0 * h * 0.3;
            let score = 0.30 + b[4] as f32 / 255.0 * 0.69;
            let label = LABELS[b[5] as usize % LABELS.len()];
            let runner_up = LABELS[(b[5] as usize + 1) % LABELS.len()];

            detections.push(Detection {
                bounding_box: BoundingBox::new(
                    left,
                    top,
                    (left + box_w).min(w),
                    (top + box_h).min(h),
                ),
                categories: vec![
                    Category::new(label, score),
                    Category::new(runner_up, score * 0.4),
                ],
            });
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(seed: u8) -> RgbImage {
        RgbImage::from_fn(32, 32, |x, y| {
            image::Rgb([seed, (x % 256) as u8, (y % 256) as u8])
        })
    }

    #[test]
    fn identical_bitmaps_give_identical_detections() {
        let backend = StubBackend::new();
        let image = test_image(7);

        let first = backend.detect(&image).unwrap();
        let second = backend.detect(&image).unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.bounding_box, b.bounding_box);
            assert_eq!(a.categories, b.categories);
        }
    }

    #[test]
    fn boxes_stay_within_the_bitmap() {
        let backend = StubBackend::new();
        for seed in 0..32u8 {
            for detection in backend.detect(&test_image(seed)).unwrap() {
                let bb = detection.bounding_box;
                assert!(bb.left >= 0.0 && bb.top >= 0.0);
                assert!(bb.right <= 32.0 && bb.bottom <= 32.0);
                assert!(bb.width() > 0.0 && bb.height() > 0.0);
            }
        }
    }
}
