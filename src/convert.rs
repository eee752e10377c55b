//! Frame conversion: planar YUV camera frames into RGB bitmaps.
//!
//! The camera delivers planar luma/chroma buffers; the detector wants an RGB
//! bitmap. Conversion interleaves the chroma planes into NV21 order, applies
//! the BT.601 matrix, then round-trips the result through a quality-100 JPEG
//! encode/decode. The round trip preserves the original system's contract:
//! output pixels are visually equivalent to the input frame, not
//! bit-identical. Dropping the JPEG step later is a one-line change.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

use crate::error::DecodeError;
use crate::frame::RawFrame;

/// Convert one camera frame into an RGB bitmap of the same pixel dimensions.
///
/// Fails with `DecodeError` when the intermediate encoding is malformed; the
/// caller drops the frame and moves on.
pub fn frame_to_bitmap(frame: &RawFrame) -> Result<RgbImage, DecodeError> {
    let nv21 = interleave_nv21(frame);
    let rgb = nv21_to_rgb(&nv21, frame.width(), frame.height())?;
    let image = RgbImage::from_raw(frame.width(), frame.height(), rgb)
        .ok_or_else(|| DecodeError::new("converted buffer does not match frame dimensions"))?;
    jpeg_round_trip(&image)
}

/// Concatenate the planes in (luma, chroma-V, chroma-U) order, interleaving
/// the chroma pairs as NV21 expects.
fn interleave_nv21(frame: &RawFrame) -> Vec<u8> {
    let mut nv21 = Vec::with_capacity(frame.luma().len() + frame.luma().len() / 2);
    nv21.extend_from_slice(frame.luma());
    for (&v, &u) in frame.chroma_v().iter().zip(frame.chroma_u()) {
        nv21.push(v);
        nv21.push(u);
    }
    nv21
}

fn nv21_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, DecodeError> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = w * h;
    let expected = y_plane + y_plane / 2;
    if pixels.len() != expected {
        return Err(DecodeError::new(format!(
            "NV21 buffer length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        )));
    }

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            // NV21 interleaves V before U.
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let v = pixels[uv_index] as f32 - 128.0;
            let u = pixels[uv_index + 1] as f32 - 128.0;

            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;

            let offset = (j * w + i) * 3;
            rgb[offset] = clamp_to_u8(r);
            rgb[offset + 1] = clamp_to_u8(g);
            rgb[offset + 2] = clamp_to_u8(b);
        }
    }

    Ok(rgb)
}

fn jpeg_round_trip(image: &RgbImage) -> Result<RgbImage, DecodeError> {
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, 100)
        .encode_image(image)
        .map_err(|e| DecodeError::new(format!("JPEG encode: {e}")))?;
    let decoded = image::load_from_memory_with_format(&encoded, ImageFormat::Jpeg)
        .map_err(|e| DecodeError::new(format!("JPEG decode: {e}")))?;
    Ok(decoded.to_rgb8())
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
