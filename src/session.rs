//! Session state: the adjustable confidence threshold, the live detector
//! handle, and the bounded log history.
//!
//! All mutation is routed through the controller; the pipeline only reads
//! the current adapter slot. The inference library cannot change its
//! threshold in place, so a threshold change swaps in a freshly built
//! adapter and discards the old one. An in-flight `detect` on the old
//! handle completes normally; its result is recognized as stale by
//! generation number and dropped unpublished.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::detect::{DetectorAdapter, DetectorOptions};
use crate::error::ModelLoadError;

pub const THRESHOLD_MIN: f32 = 0.10;
pub const THRESHOLD_MAX: f32 = 1.00;
pub const THRESHOLD_STEP: f32 = 0.05;

/// Bounded log history capacity; the oldest entry is evicted beyond this.
pub const LOG_CAPACITY: usize = 50;

struct AdapterSlot {
    adapter: Option<Arc<DetectorAdapter>>,
    next_generation: u64,
}

/// Owns the threshold, the current adapter handle, and the log history.
pub struct SessionController {
    options: Mutex<DetectorOptions>,
    slot: Mutex<AdapterSlot>,
    fatal: Mutex<Option<String>>,
    log: Mutex<VecDeque<String>>,
}

impl SessionController {
    /// Build the initial adapter from `options`. A model-load failure here
    /// is fatal and surfaced to the caller.
    pub fn new(options: DetectorOptions) -> Result<Arc<Self>, ModelLoadError> {
        let adapter = DetectorAdapter::with_generation(options.clone(), 0)?;
        Ok(Arc::new(Self {
            options: Mutex::new(options),
            slot: Mutex::new(AdapterSlot {
                adapter: Some(Arc::new(adapter)),
                next_generation: 1,
            }),
            fatal: Mutex::new(None),
            log: Mutex::new(VecDeque::with_capacity(LOG_CAPACITY)),
        }))
    }

    /// The live adapter, if any. None while in the fatal model-load state.
    pub fn current_adapter(&self) -> Option<Arc<DetectorAdapter>> {
        self.slot.lock().expect("adapter slot lock").adapter.clone()
    }

    /// Whether a result produced by an adapter of `generation` is still
    /// current (publishable).
    pub fn is_current(&self, generation: u64) -> bool {
        self.slot
            .lock()
            .expect("adapter slot lock")
            .adapter
            .as_ref()
            .map(|a| a.generation() == generation)
            .unwrap_or(false)
    }

    pub fn threshold(&self) -> f32 {
        self.options.lock().expect("options lock").score_threshold
    }

    /// Raise the threshold one step, clamped at the upper bound. Rebuilds
    /// the adapter when the value actually changed.
    pub fn increment_threshold(&self) -> Result<f32, ModelLoadError> {
        self.step_threshold(THRESHOLD_STEP)
    }

    /// Lower the threshold one step, clamped at the lower bound.
    pub fn decrement_threshold(&self) -> Result<f32, ModelLoadError> {
        self.step_threshold(-THRESHOLD_STEP)
    }

    fn step_threshold(&self, delta: f32) -> Result<f32, ModelLoadError> {
        let new_options = {
            let mut options = self.options.lock().expect("options lock");
            let stepped = options.score_threshold + delta;
            // Snap to the 0.05 grid so repeated float steps cannot drift.
            let snapped = (stepped * 20.0).round() / 20.0;
            let clamped = snapped.clamp(THRESHOLD_MIN, THRESHOLD_MAX);
            if (clamped - options.score_threshold).abs() < f32::EPSILON {
                return Ok(options.score_threshold);
            }
            options.score_threshold = clamped;
            options.clone()
        };
        let threshold = new_options.score_threshold;
        self.rebuild(new_options)?;
        Ok(threshold)
    }

    /// Swap in a freshly built adapter for `options`. On failure the slot is
    /// left empty and the error is recorded until a later rebuild succeeds.
    fn rebuild(&self, options: DetectorOptions) -> Result<(), ModelLoadError> {
        let mut slot = self.slot.lock().expect("adapter slot lock");
        let generation = slot.next_generation;
        slot.next_generation += 1;

        match DetectorAdapter::with_generation(options, generation) {
            Ok(adapter) => {
                slot.adapter = Some(Arc::new(adapter));
                *self.fatal.lock().expect("fatal lock") = None;
                Ok(())
            }
            Err(e) => {
                slot.adapter = None;
                *self.fatal.lock().expect("fatal lock") = Some(e.to_string());
                Err(e)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn set_model_for_tests(&self, model: &str) {
        self.options.lock().expect("options lock").model = model.to_string();
    }

    /// The persistent model-load failure, if detection is currently halted.
    pub fn fatal_error(&self) -> Option<String> {
        self.fatal.lock().expect("fatal lock").clone()
    }

    /// Prepend a log entry, evicting the oldest beyond capacity.
    pub fn append_log(&self, entry: String) {
        let mut log = self.log.lock().expect("log lock");
        log.push_front(entry);
        while log.len() > LOG_CAPACITY {
            log.pop_back();
        }
    }

    /// Snapshot of the log history, newest first.
    pub fn log_entries(&self) -> Vec<String> {
        self.log.lock().expect("log lock").iter().cloned().collect()
    }

    pub fn clear_log(&self) {
        self.log.lock().expect("log lock").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> Arc<SessionController> {
        SessionController::new(DetectorOptions::default()).unwrap()
    }

    #[test]
    fn threshold_walk_stays_in_bounds() {
        let session = controller();

        for _ in 0..30 {
            let t = session.increment_threshold().unwrap();
            assert!(t <= THRESHOLD_MAX + f32::EPSILON);
        }
        assert!((session.threshold() - THRESHOLD_MAX).abs() < 1e-6);

        for _ in 0..40 {
            let t = session.decrement_threshold().unwrap();
            assert!(t >= THRESHOLD_MIN - f32::EPSILON);
        }
        assert!((session.threshold() - THRESHOLD_MIN).abs() < 1e-6);

        // Mixed sequences stay on the grid and in bounds.
        for i in 0..100 {
            let t = if i % 3 == 0 {
                session.increment_threshold().unwrap()
            } else {
                session.decrement_threshold().unwrap()
            };
            assert!((THRESHOLD_MIN..=THRESHOLD_MAX).contains(&t));
        }
    }

    #[test]
    fn threshold_change_swaps_in_new_generation() {
        let session = controller();
        let before = session.current_adapter().unwrap();

        session.decrement_threshold().unwrap();
        let after = session.current_adapter().unwrap();

        assert_ne!(before.generation(), after.generation());
        assert!(!session.is_current(before.generation()));
        assert!(session.is_current(after.generation()));
        assert!((after.score_threshold() - 0.55).abs() < 1e-6);
    }

    #[test]
    fn step_at_bound_does_not_rebuild() {
        let session = controller();
        for _ in 0..10 {
            session.increment_threshold().unwrap();
        }
        let pinned = session.current_adapter().unwrap();
        session.increment_threshold().unwrap();
        let still = session.current_adapter().unwrap();
        assert_eq!(pinned.generation(), still.generation());
    }

    #[test]
    fn rebuild_failure_is_fatal_until_recovery() {
        let session = controller();
        {
            let mut options = session.options.lock().unwrap();
            options.model = "/missing/model.onnx".to_string();
        }

        assert!(session.decrement_threshold().is_err());
        assert!(session.current_adapter().is_none());
        assert!(session.fatal_error().is_some());

        {
            let mut options = session.options.lock().unwrap();
            options.model = "stub://detector".to_string();
        }
        session.decrement_threshold().unwrap();
        assert!(session.current_adapter().is_some());
        assert!(session.fatal_error().is_none());
    }

    #[test]
    fn log_history_is_bounded_and_newest_first() {
        let session = controller();
        for i in 0..51 {
            session.append_log(format!("entry {i}"));
        }

        let entries = session.log_entries();
        assert_eq!(entries.len(), LOG_CAPACITY);
        assert_eq!(entries[0], "entry 50");
        assert_eq!(entries.last().unwrap(), "entry 1");

        session.clear_log();
        assert!(session.log_entries().is_empty());
    }
}
