use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::detect::DetectorOptions;
use crate::ingest::CameraConfig;
use crate::session::{THRESHOLD_MAX, THRESHOLD_MIN};

#[derive(Debug, Deserialize, Default)]
struct FramesightConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    overlay: Option<OverlayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model: Option<String>,
    max_results: Option<usize>,
    score_threshold: Option<f32>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    labels_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    font_path: Option<PathBuf>,
}

/// Daemon configuration: JSON file named by `FRAMESIGHT_CONFIG`, with
/// individual `FRAMESIGHT_*` environment overrides on top.
#[derive(Debug, Clone)]
pub struct FramesightConfig {
    pub camera: CameraConfig,
    pub detector: DetectorOptions,
    pub font_path: Option<PathBuf>,
}

impl FramesightConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FRAMESIGHT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FramesightConfigFile) -> Self {
        let camera_defaults = CameraConfig::default();
        let camera = CameraConfig {
            url: file
                .camera
                .as_ref()
                .and_then(|camera| camera.url.clone())
                .unwrap_or(camera_defaults.url),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(camera_defaults.target_fps),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(camera_defaults.width),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(camera_defaults.height),
        };

        let detector_defaults = DetectorOptions::default();
        let detector = DetectorOptions {
            model: file
                .detector
                .as_ref()
                .and_then(|detector| detector.model.clone())
                .unwrap_or(detector_defaults.model),
            max_results: file
                .detector
                .as_ref()
                .and_then(|detector| detector.max_results)
                .unwrap_or(detector_defaults.max_results),
            score_threshold: file
                .detector
                .as_ref()
                .and_then(|detector| detector.score_threshold)
                .unwrap_or(detector_defaults.score_threshold),
            input_width: file
                .detector
                .as_ref()
                .and_then(|detector| detector.input_width)
                .unwrap_or(detector_defaults.input_width),
            input_height: file
                .detector
                .as_ref()
                .and_then(|detector| detector.input_height)
                .unwrap_or(detector_defaults.input_height),
            labels_path: file.detector.and_then(|detector| detector.labels_path),
        };

        Self {
            camera,
            detector,
            font_path: file.overlay.and_then(|overlay| overlay.font_path),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("FRAMESIGHT_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(model) = std::env::var("FRAMESIGHT_MODEL") {
            if !model.trim().is_empty() {
                self.detector.model = model;
            }
        }
        if let Ok(threshold) = std::env::var("FRAMESIGHT_SCORE_THRESHOLD") {
            let value: f32 = threshold
                .parse()
                .map_err(|_| anyhow!("FRAMESIGHT_SCORE_THRESHOLD must be a float"))?;
            self.detector.score_threshold = value;
        }
        if let Ok(path) = std::env::var("FRAMESIGHT_FONT_PATH") {
            if !path.trim().is_empty() {
                self.font_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(THRESHOLD_MIN..=THRESHOLD_MAX).contains(&self.detector.score_threshold) {
            return Err(anyhow!(
                "score threshold {} outside [{}, {}]",
                self.detector.score_threshold,
                THRESHOLD_MIN,
                THRESHOLD_MAX
            ));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        if self.camera.width % 2 != 0 || self.camera.height % 2 != 0 {
            return Err(anyhow!(
                "camera dimensions must be even, got {}x{}",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.detector.max_results == 0 {
            return Err(anyhow!("detector max_results must be at least 1"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<FramesightConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
