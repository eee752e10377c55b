//! Camera frame sources.
//!
//! The daemon pulls planar YUV frames from a `CameraSource` and offers them
//! to the pipeline through the single-slot channel, which implements the
//! required "keep only latest" backpressure mode.
//!
//! `stub://` URLs select a synthetic source that simulates a scene with
//! occasional changes; real capture backends plug in behind the same
//! interface.

use anyhow::{bail, Result};

use crate::frame::RawFrame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Stream URL. `stub://name` selects the synthetic source.
    pub url: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Frame width in pixels (even).
    pub width: u32,
    /// Frame height in pixels (even).
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub url: String,
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            })
        } else {
            bail!("camera url '{}' requires a capture backend", config.url)
        }
    }

    /// Connect to the stream.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
        }
    }

    /// Capture the next frame.
    pub fn next_frame(&mut self) -> Result<RawFrame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and the demo daemon
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    /// Simulated "scene" state; changes occasionally so successive frames
    /// are not all identical.
    scene_state: u8,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
        }
    }

    /// Synthetic sources are always "connected".
    fn connect(&mut self) -> Result<()> {
        log::info!("CameraSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<RawFrame> {
        self.frame_count += 1;

        // Change scene state occasionally to simulate objects entering.
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let (y, v, u) = self.generate_planes();
        RawFrame::new(
            y,
            v,
            u,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
    }

    /// Fill the planes with a cheap position/frame/scene mix plus a little
    /// noise, so pixel content varies between frames.
    fn generate_planes(&mut self) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let luma_len = (self.config.width * self.config.height) as usize;
        let chroma_len = luma_len / 4;
        let noise: u8 = rand::random();

        let mut y = vec![0u8; luma_len];
        for (i, value) in y.iter_mut().enumerate() {
            *value =
                ((i as u64 + self.frame_count + self.scene_state as u64 + noise as u64) % 256) as u8;
        }

        let mut v = vec![0u8; chroma_len];
        let mut u = vec![0u8; chroma_len];
        for i in 0..chroma_len {
            v[i] = 128u8.wrapping_add((self.scene_state as usize + i / 64) as u8);
            u[i] = 128u8.wrapping_sub((self.scene_state as usize + i / 64) as u8);
        }

        (y, v, u)
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            url: "stub://test".to_string(),
            target_fps: 10,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn synthetic_source_produces_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        let frame = source.next_frame()?;
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.sequence(), 1);

        let frame = source.next_frame()?;
        assert_eq!(frame.sequence(), 2);
        assert_eq!(source.stats().frames_captured, 2);

        Ok(())
    }

    #[test]
    fn non_stub_url_is_rejected() {
        let config = CameraConfig {
            url: "rtsp://camera-1".to_string(),
            ..stub_config()
        };
        assert!(CameraSource::new(config).is_err());
    }
}
