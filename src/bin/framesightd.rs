//! framesightd - live object detection daemon
//!
//! This daemon:
//! 1. Pulls planar YUV frames from the configured camera source
//! 2. Hands them to the pipeline through a single-slot, keep-newest channel
//! 3. Converts, runs the detector, and publishes detection snapshots
//! 4. Appends a throttled textual log through the session controller
//! 5. Reports health and drop counters periodically

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use framesight::{
    frame_slot, CameraSource, DetectionPipeline, FramesightConfig, SessionController,
};

const HEALTH_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = FramesightConfig::load()?;

    // A model-load failure here is fatal: no detections are possible.
    let session = SessionController::new(cfg.detector.clone())
        .context("load detection model (detection cannot start)")?;

    let mut source = CameraSource::new(cfg.camera.clone())?;
    source.connect()?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .context("install shutdown handler")?;
    }

    let (producer, consumer) = frame_slot();
    let frame_interval = Duration::from_millis(1000 / cfg.camera.target_fps.max(1) as u64);

    let camera_thread = {
        let running = running.clone();
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match source.next_frame() {
                    Ok(frame) => {
                        if !producer.offer(frame) {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("frame capture failed: {}", e);
                    }
                }
                thread::sleep(frame_interval);
            }
            log::info!(
                "camera stopped: {} frames captured, {} overwritten undelivered",
                source.stats().frames_captured,
                producer.dropped_frames()
            );
            // Dropping the producer disconnects the slot and stops the
            // pipeline worker.
        })
    };

    let pipeline = DetectionPipeline::new(session.clone());
    let published = pipeline.published();
    let stats = pipeline.stats();
    let worker_thread = thread::spawn(move || pipeline.run(consumer));

    log::info!(
        "framesightd running: camera={} model={} threshold={:.2}",
        cfg.camera.url,
        cfg.detector.model,
        session.threshold()
    );

    let mut last_health = Instant::now();
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));

        if last_health.elapsed() >= HEALTH_INTERVAL {
            last_health = Instant::now();

            if let Some(error) = session.fatal_error() {
                log::error!("detection halted: {}", error);
            }

            let latest = published
                .read()
                .expect("published lock")
                .as_ref()
                .map(|snapshot| (snapshot.sequence, snapshot.detections.len()));
            match latest {
                Some((sequence, count)) => log::info!(
                    "health: processed={} published={} dropped={} latest_seq={} detections={}",
                    stats.processed(),
                    stats.published(),
                    stats.dropped(),
                    sequence,
                    count
                ),
                None => log::info!(
                    "health: processed={} published={} dropped={} (nothing published yet)",
                    stats.processed(),
                    stats.published(),
                    stats.dropped()
                ),
            }
        }
    }

    log::info!("shutting down");
    camera_thread
        .join()
        .map_err(|_| anyhow::anyhow!("camera thread panicked"))?;
    worker_thread
        .join()
        .map_err(|_| anyhow::anyhow!("pipeline thread panicked"))?;

    if let Some(entry) = session.log_entries().first() {
        log::info!("last detection log entry:\n{}", entry);
    }

    Ok(())
}
