//! framesight - live object detection kernel
//!
//! Runs a pretrained object-detection model on live camera frames and
//! publishes bounding boxes plus label/score overlays.
//!
//! # Architecture
//!
//! Data flows one way:
//!
//! camera -> frame converter -> detection pipeline -> { detector adapter }
//! -> { overlay renderer, session log }
//!
//! - `frame`: planar YUV frame model and the single-slot, keep-newest
//!   handoff between the camera producer and the pipeline worker
//! - `convert`: planar frame -> NV21 -> RGB bitmap (JPEG round trip)
//! - `detect`: detector adapter over pluggable backends (`stub://`,
//!   ONNX via the `backend-tract` feature)
//! - `pipeline`: per-frame convert/detect/publish cycle, drop-and-continue
//!   error policy, throttled session log
//! - `overlay`: box and label rendering scaled to the display surface
//! - `session`: threshold control, adapter rebuild-on-change, bounded log
//!   history
//!
//! The pipeline runs on one dedicated worker thread; control actions
//! (threshold steps, log clearing) come from the UI side through the
//! session controller, and renderers observe results via the published
//! snapshot. A threshold change rebuilds the adapter: the inference
//! library only accepts its options at construction time.

pub mod config;
pub mod convert;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod pipeline;
pub mod session;

pub use config::FramesightConfig;
pub use convert::frame_to_bitmap;
pub use detect::{
    BoundingBox, Category, Detection, DetectionSet, DetectorAdapter, DetectorBackend,
    DetectorOptions, StubBackend,
};
pub use error::{DecodeError, InferenceError, ModelLoadError};
pub use frame::{frame_slot, FrameConsumer, FrameProducer, RawFrame};
pub use ingest::{CameraConfig, CameraSource, CameraStats};
pub use overlay::{scale_box, OverlayRenderer, PixelSize, LABEL_HEIGHT, MIN_LABEL_WIDTH};
pub use pipeline::{
    CycleOutcome, DetectionPipeline, PipelineStats, PublishedDetections, PublishedHandle,
    LOG_INTERVAL,
};
pub use session::{
    SessionController, LOG_CAPACITY, THRESHOLD_MAX, THRESHOLD_MIN, THRESHOLD_STEP,
};
