//! Per-frame orchestration: pull a frame, convert it, run the detector,
//! publish the results, release the frame.
//!
//! The pipeline runs on one dedicated worker thread and never holds more
//! than one frame; backpressure lives in the frame slot (newest frame
//! wins). Per-frame failures are counted and swallowed so they never stop
//! subsequent frames; only the absence of a live adapter (fatal model-load
//! state) halts publishing, and that state stays visible through the
//! session controller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::convert::frame_to_bitmap;
use crate::detect::DetectionSet;
use crate::frame::{FrameConsumer, RawFrame};
use crate::session::SessionController;

/// Wall-clock interval between textual log entries. Detections themselves
/// are republished every cycle regardless of this cadence.
pub const LOG_INTERVAL: Duration = Duration::from_millis(2000);

/// The most recent DetectionSet, with the inference bitmap dimensions the
/// renderer needs for scale-factor computation. Each publish replaces the
/// previous snapshot entirely.
#[derive(Clone, Debug, Default)]
pub struct PublishedDetections {
    pub detections: DetectionSet,
    pub image_width: u32,
    pub image_height: u32,
    pub sequence: u64,
}

/// Shared handoff slot read by the UI/render side.
pub type PublishedHandle = Arc<RwLock<Option<PublishedDetections>>>;

/// Drop/publish counters, readable from other threads.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub frames_processed: AtomicU64,
    pub frames_published: AtomicU64,
    pub decode_failures: AtomicU64,
    pub inference_failures: AtomicU64,
    pub stale_results: AtomicU64,
}

impl PipelineStats {
    pub fn processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
            + self.inference_failures.load(Ordering::Relaxed)
            + self.stale_results.load(Ordering::Relaxed)
    }
}

/// Outcome of one processing cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Published,
    /// No live adapter; fatal model-load state upstream.
    NoDetector,
    DecodeFailed,
    InferenceFailed,
    /// Detection succeeded on a superseded adapter; result discarded.
    Stale,
}

pub struct DetectionPipeline {
    session: Arc<SessionController>,
    published: PublishedHandle,
    stats: Arc<PipelineStats>,
    last_log: Option<Instant>,
}

impl DetectionPipeline {
    pub fn new(session: Arc<SessionController>) -> Self {
        Self {
            session,
            published: Arc::new(RwLock::new(None)),
            stats: Arc::new(PipelineStats::default()),
            last_log: None,
        }
    }

    /// Handle for readers of the published snapshot.
    pub fn published(&self) -> PublishedHandle {
        self.published.clone()
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Consume frames until the producer disconnects.
    pub fn run(mut self, frames: FrameConsumer) {
        while let Ok(frame) = frames.recv() {
            self.process_frame(frame);
        }
        log::info!(
            "frame source disconnected; pipeline stopped after {} frames ({} published, {} dropped)",
            self.stats.processed(),
            self.stats.published(),
            self.stats.dropped()
        );
    }

    /// One full cycle. Takes the frame by value: it is released exactly
    /// once, on every exit path, when it goes out of scope here.
    pub fn process_frame(&mut self, frame: RawFrame) -> CycleOutcome {
        self.stats.frames_processed.fetch_add(1, Ordering::Relaxed);
        let sequence = frame.sequence();

        let Some(adapter) = self.session.current_adapter() else {
            return CycleOutcome::NoDetector;
        };

        let bitmap = match frame_to_bitmap(&frame) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                log::warn!("frame {} dropped: {}", sequence, e);
                self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                return CycleOutcome::DecodeFailed;
            }
        };

        let detections = match adapter.detect(&bitmap) {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!("frame {} dropped: {}", sequence, e);
                self.stats
                    .inference_failures
                    .fetch_add(1, Ordering::Relaxed);
                return CycleOutcome::InferenceFailed;
            }
        };

        // A rebuild that began after we picked up the handle wins; the old
        // handle's result is discarded rather than published out of order.
        if !self.session.is_current(adapter.generation()) {
            self.stats.stale_results.fetch_add(1, Ordering::Relaxed);
            return CycleOutcome::Stale;
        }

        let (image_width, image_height) = bitmap.dimensions();
        let snapshot = PublishedDetections {
            detections: detections.clone(),
            image_width,
            image_height,
            sequence,
        };
        *self.published.write().expect("published lock") = Some(snapshot);
        self.stats.frames_published.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let due = self
            .last_log
            .map(|at| now.duration_since(at) >= LOG_INTERVAL)
            .unwrap_or(true);
        if due {
            self.session.append_log(detections.summary());
            self.last_log = Some(now);
        }

        CycleOutcome::Published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectorOptions;
    use crate::frame::RawFrame;

    fn frame(sequence: u64) -> RawFrame {
        let luma: Vec<u8> = (0..64 * 48).map(|i| (i % 251) as u8).collect();
        RawFrame::new(luma, vec![140; 768], vec![110; 768], 64, 48, sequence).unwrap()
    }

    fn pipeline(threshold: f32) -> DetectionPipeline {
        let options = DetectorOptions {
            score_threshold: threshold,
            ..DetectorOptions::default()
        };
        let session = SessionController::new(options).unwrap();
        DetectionPipeline::new(session)
    }

    #[test]
    fn publishes_snapshot_with_bitmap_dimensions() {
        let mut pipeline = pipeline(0.3);
        let published = pipeline.published();

        assert_eq!(pipeline.process_frame(frame(7)), CycleOutcome::Published);

        let snapshot = published.read().unwrap().clone().expect("published");
        assert_eq!(snapshot.image_width, 64);
        assert_eq!(snapshot.image_height, 48);
        assert_eq!(snapshot.sequence, 7);
        for detection in snapshot.detections.iter() {
            assert!(detection.top_score() >= 0.3);
        }
    }

    #[test]
    fn each_publish_replaces_the_previous_set() {
        let mut pipeline = pipeline(0.3);
        let published = pipeline.published();

        pipeline.process_frame(frame(1));
        pipeline.process_frame(frame(2));

        let snapshot = published.read().unwrap().clone().expect("published");
        assert_eq!(snapshot.sequence, 2);
    }

    #[test]
    fn log_entries_are_throttled_but_publishing_is_not() {
        let mut pipeline = pipeline(0.1);
        let session = pipeline.session.clone();

        pipeline.process_frame(frame(1));
        pipeline.process_frame(frame(2));
        pipeline.process_frame(frame(3));

        // Only the first cycle logged; all three published.
        assert_eq!(session.log_entries().len(), 1);
        assert_eq!(pipeline.stats().published(), 3);

        // Force the interval to elapse.
        pipeline.last_log = Some(Instant::now() - LOG_INTERVAL - Duration::from_millis(10));
        pipeline.process_frame(frame(4));
        assert_eq!(session.log_entries().len(), 2);
    }

    #[test]
    fn no_adapter_means_no_publish() {
        let mut pipeline = pipeline(0.3);
        // Force the fatal state: point the options at a missing artifact and
        // trigger a rebuild.
        pipeline.session.set_model_for_tests("/missing/model.onnx");
        let _ = pipeline.session.decrement_threshold();

        assert_eq!(pipeline.process_frame(frame(1)), CycleOutcome::NoDetector);
        assert!(pipeline.published().read().unwrap().is_none());
        assert!(pipeline.session.fatal_error().is_some());
    }
}
