use std::fmt::Write as _;

/// Axis-aligned bounding box in pixel coordinates of the inference bitmap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// One ranked label for a detection.
#[derive(Clone, Debug, PartialEq)]
pub struct Category {
    pub label: String,
    /// Confidence in [0, 1].
    pub score: f32,
}

impl Category {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// One model output: a bounding box plus label/score pairs ordered by
/// descending score. Immutable once produced.
#[derive(Clone, Debug)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub categories: Vec<Category>,
}

impl Detection {
    pub fn top_category(&self) -> Option<&Category> {
        self.categories.first()
    }

    pub fn top_score(&self) -> f32 {
        self.top_category().map(|c| c.score).unwrap_or(0.0)
    }
}

/// Ordered detections for one frame. Each set replaces the previous one
/// entirely; there is no merging across frames.
#[derive(Clone, Debug, Default)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    /// One line per detection's top category, newline-joined, for the
    /// session log ("person: 0.87").
    pub fn summary(&self) -> String {
        let mut text = String::new();
        for (i, detection) in self.detections.iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            match detection.top_category() {
                Some(category) => {
                    let _ = write!(text, "{}: {:.2}", category.label, category.score);
                }
                None => text.push('?'),
            }
        }
        text
    }
}
