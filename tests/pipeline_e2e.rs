use std::sync::Arc;
use std::thread;
use std::time::Duration;

use framesight::{
    frame_slot, CameraConfig, CameraSource, DetectionPipeline, DetectorOptions, SessionController,
    THRESHOLD_MAX, THRESHOLD_MIN,
};

fn test_camera() -> CameraSource {
    let mut camera = CameraSource::new(CameraConfig {
        url: "stub://e2e_camera".to_string(),
        target_fps: 30,
        width: 64,
        height: 48,
    })
    .expect("camera source");
    camera.connect().expect("connect synthetic camera");
    camera
}

fn test_session(score_threshold: f32) -> Arc<SessionController> {
    SessionController::new(DetectorOptions {
        model: "stub://e2e_detector".to_string(),
        score_threshold,
        ..DetectorOptions::default()
    })
    .expect("session with stub detector")
}

#[test]
fn camera_to_published_snapshot() {
    let session = test_session(0.3);
    let pipeline = DetectionPipeline::new(Arc::clone(&session));
    let published = pipeline.published();
    let stats = pipeline.stats();

    let (producer, consumer) = frame_slot();
    let worker = thread::spawn(move || pipeline.run(consumer));

    let mut camera = test_camera();
    for _ in 0..30 {
        let frame = camera.next_frame().expect("synthetic frame");
        producer.offer(frame);
        thread::sleep(Duration::from_millis(2));
    }
    drop(producer);
    worker.join().expect("pipeline worker");

    assert!(stats.processed() > 0, "worker consumed no frames");
    assert_eq!(stats.published(), stats.processed());

    let snapshot = published
        .read()
        .unwrap()
        .clone()
        .expect("a snapshot was published");
    assert_eq!(snapshot.image_width, 64);
    assert_eq!(snapshot.image_height, 48);

    // First publish always logs, later ones are throttled.
    assert!(!session.log_entries().is_empty());
    assert!(session.fatal_error().is_none());
}

#[test]
fn snapshot_holds_newest_processed_frame() {
    let session = test_session(0.6);
    let pipeline = DetectionPipeline::new(Arc::clone(&session));
    let published = pipeline.published();

    let (producer, consumer) = frame_slot();
    let worker = thread::spawn(move || pipeline.run(consumer));

    let mut camera = test_camera();
    let mut last_sequence = 0;
    for _ in 0..10 {
        let frame = camera.next_frame().expect("synthetic frame");
        last_sequence = frame.sequence();
        producer.offer(frame);
        thread::sleep(Duration::from_millis(5));
    }
    drop(producer);
    worker.join().expect("pipeline worker");

    let snapshot = published
        .read()
        .unwrap()
        .clone()
        .expect("a snapshot was published");
    assert_eq!(snapshot.sequence, last_sequence);
}

#[test]
fn threshold_rebuilds_while_frames_are_in_flight() {
    let session = test_session(0.6);
    let pipeline = DetectionPipeline::new(Arc::clone(&session));
    let stats = pipeline.stats();

    let (producer, consumer) = frame_slot();
    let worker = thread::spawn(move || pipeline.run(consumer));

    let stepper_session = Arc::clone(&session);
    let stepper = thread::spawn(move || {
        for i in 0..40 {
            if i % 2 == 0 {
                stepper_session.increment_threshold().expect("step up");
            } else {
                stepper_session.decrement_threshold().expect("step down");
            }
            thread::sleep(Duration::from_millis(1));
        }
    });

    let mut camera = test_camera();
    for _ in 0..60 {
        let frame = camera.next_frame().expect("synthetic frame");
        producer.offer(frame);
        thread::sleep(Duration::from_millis(1));
    }
    drop(producer);

    stepper.join().expect("threshold stepper");
    worker.join().expect("pipeline worker");

    let threshold = session.threshold();
    assert!((THRESHOLD_MIN..=THRESHOLD_MAX).contains(&threshold));
    assert!(stats.processed() > 0);
    // Results from superseded adapter generations are discarded, never
    // published, and never fatal.
    assert_eq!(
        stats.published() + stats.dropped(),
        stats.processed(),
        "every processed frame either publishes or is counted as dropped"
    );
    assert!(session.fatal_error().is_none());
}
