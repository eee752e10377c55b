//! Overlay rendering: bounding boxes and label/score text scaled from
//! inference coordinates to display coordinates.
//!
//! Rendering is stateless and idempotent per `DetectionSet`: every call
//! starts from a fresh transparent canvas, so redrawing the same set
//! produces pixel-identical output and nothing accumulates across frames.

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::{BoundingBox, DetectionSet};

/// Minimum width of the filled label background, in display pixels.
pub const MIN_LABEL_WIDTH: u32 = 120;
/// Height of the filled label background, in display pixels.
pub const LABEL_HEIGHT: u32 = 40;

const BOX_THICKNESS: u32 = 4;
const TEXT_SCALE: f32 = 32.0;
const TEXT_INSET_X: i32 = 10;

// 0xFF4CAF50 at 70% alpha, the original scheme.
const BOX_COLOR: Rgba<u8> = Rgba([76, 175, 80, 178]);
const LABEL_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 153]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Pixel dimensions of a bitmap or display surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Map a bounding box from inference-bitmap coordinates to display
/// coordinates, with independent horizontal and vertical scale factors.
pub fn scale_box(bbox: &BoundingBox, inference: PixelSize, display: PixelSize) -> BoundingBox {
    let scale_x = display.width as f32 / inference.width as f32;
    let scale_y = display.height as f32 / inference.height as f32;
    BoundingBox::new(
        bbox.left * scale_x,
        bbox.top * scale_y,
        bbox.right * scale_x,
        bbox.bottom * scale_y,
    )
}

/// Draws detection overlays onto a transparent canvas sized to the display
/// surface. Text is rendered when a font is configured; the box and label
/// background never depend on one.
pub struct OverlayRenderer {
    font: Option<FontArc>,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self { font: None }
    }

    /// Use the given TrueType/OpenType font bytes for label text.
    pub fn with_font_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = FontArc::try_from_vec(bytes).context("parse overlay font")?;
        Ok(Self { font: Some(font) })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render one DetectionSet against a display surface. The canvas is
    /// fresh every call; same inputs give pixel-identical output.
    pub fn render(
        &self,
        detections: &DetectionSet,
        inference: PixelSize,
        display: PixelSize,
    ) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(display.width, display.height, Rgba([0, 0, 0, 0]));

        for detection in detections.iter() {
            let scaled = scale_box(&detection.bounding_box, inference, display);
            self.draw_box(&mut canvas, &scaled);
            self.draw_label(&mut canvas, &scaled, detection);
        }

        canvas
    }

    /// Blend the overlay for `detections` onto a copy of the photo itself
    /// (display size == inference size). Used by the one-shot CLI.
    pub fn annotate(&self, image: &RgbImage, detections: &DetectionSet) -> RgbImage {
        let (width, height) = image.dimensions();
        let size = PixelSize::new(width, height);
        let overlay = self.render(detections, size, size);

        let mut out = image.clone();
        for (x, y, pixel) in overlay.enumerate_pixels() {
            let alpha = pixel.0[3] as u16;
            if alpha == 0 {
                continue;
            }
            let base = out.get_pixel_mut(x, y);
            for c in 0..3 {
                let blended =
                    (pixel.0[c] as u16 * alpha + base.0[c] as u16 * (255 - alpha)) / 255;
                base.0[c] = blended as u8;
            }
        }
        out
    }

    fn draw_box(&self, canvas: &mut RgbaImage, bbox: &BoundingBox) {
        let (width, height) = canvas.dimensions();
        let left = bbox.left.round().max(0.0) as i32;
        let top = bbox.top.round().max(0.0) as i32;
        let right = (bbox.right.round() as i32).min(width as i32 - 1);
        let bottom = (bbox.bottom.round() as i32).min(height as i32 - 1);
        if right <= left || bottom <= top {
            return;
        }

        for t in 0..BOX_THICKNESS as i32 {
            let l = left + t;
            let tp = top + t;
            let r = right - t;
            let b = bottom - t;
            if r <= l || b <= tp {
                break;
            }
            let rect = Rect::at(l, tp).of_size((r - l) as u32, (b - tp) as u32);
            draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
        }
    }

    fn draw_label(
        &self,
        canvas: &mut RgbaImage,
        bbox: &BoundingBox,
        detection: &crate::detect::Detection,
    ) {
        let box_width = bbox.width().round().max(0.0) as u32;
        let label_width = box_width.max(MIN_LABEL_WIDTH);
        let left = bbox.left.round() as i32;
        let label_top = bbox.top.round() as i32 - LABEL_HEIGHT as i32;

        draw_filled_rect_mut(
            canvas,
            Rect::at(left, label_top).of_size(label_width, LABEL_HEIGHT),
            LABEL_BACKGROUND,
        );

        if let Some(font) = &self.font {
            let (label, score) = match detection.top_category() {
                Some(category) => (category.label.as_str(), category.score),
                None => ("?", 0.0),
            };
            let text = format!("{}: {:.1}%", label, score * 100.0);
            draw_text_mut(
                canvas,
                TEXT_COLOR,
                left + TEXT_INSET_X,
                label_top + 4,
                PxScale::from(TEXT_SCALE),
                font,
                &text,
            );
        }
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Category, Detection};

    fn set_with_box(left: f32, top: f32, right: f32, bottom: f32) -> DetectionSet {
        DetectionSet::new(vec![Detection {
            bounding_box: BoundingBox::new(left, top, right, bottom),
            categories: vec![Category::new("person", 0.875)],
        }])
    }

    #[test]
    fn doubling_display_size_doubles_box_edges() {
        let scaled = scale_box(
            &BoundingBox::new(100.0, 100.0, 200.0, 200.0),
            PixelSize::new(640, 480),
            PixelSize::new(1280, 960),
        );
        assert_eq!(scaled, BoundingBox::new(200.0, 200.0, 400.0, 400.0));
    }

    #[test]
    fn scale_factors_are_independent() {
        let scaled = scale_box(
            &BoundingBox::new(0.0, 0.0, 640.0, 480.0),
            PixelSize::new(640, 480),
            PixelSize::new(320, 960),
        );
        assert_eq!(scaled, BoundingBox::new(0.0, 0.0, 320.0, 960.0));
    }

    #[test]
    fn rendering_is_idempotent() {
        let renderer = OverlayRenderer::new();
        let set = set_with_box(50.0, 80.0, 150.0, 200.0);
        let inference = PixelSize::new(320, 240);
        let display = PixelSize::new(640, 480);

        let first = renderer.render(&set, inference, display);
        let second = renderer.render(&set, inference, display);
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn canvas_does_not_accumulate_across_draws() {
        let renderer = OverlayRenderer::new();
        let inference = PixelSize::new(320, 240);
        let display = PixelSize::new(320, 240);

        let a = set_with_box(10.0, 60.0, 100.0, 120.0);
        let b = set_with_box(150.0, 140.0, 300.0, 230.0);

        let first = renderer.render(&a, inference, display);
        let _interleaved = renderer.render(&b, inference, display);
        let again = renderer.render(&a, inference, display);
        assert_eq!(first.as_raw(), again.as_raw());
    }

    #[test]
    fn label_background_has_minimum_width() {
        let renderer = OverlayRenderer::new();
        let size = PixelSize::new(640, 480);
        // A 30px-wide box still gets a 120px label background.
        let set = set_with_box(40.0, 100.0, 70.0, 160.0);

        let canvas = renderer.render(&set, size, size);
        let y = 100 - LABEL_HEIGHT / 2;
        assert_eq!(*canvas.get_pixel(40 + MIN_LABEL_WIDTH - 1, y), LABEL_BACKGROUND);
        assert_eq!(*canvas.get_pixel(40 + MIN_LABEL_WIDTH + 1, y), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn empty_set_renders_blank_canvas() {
        let renderer = OverlayRenderer::new();
        let canvas = renderer.render(
            &DetectionSet::default(),
            PixelSize::new(320, 240),
            PixelSize::new(320, 240),
        );
        assert!(canvas.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }
}
