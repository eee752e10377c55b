//! Camera frame model and the single-slot handoff between camera and pipeline.
//!
//! - `RawFrame`: one planar YUV frame. Owned exclusively by the pipeline for
//!   the duration of one processing cycle and released (dropped) on every
//!   exit path; never retained across cycles.
//! - `FrameSlot` halves (`FrameProducer`/`FrameConsumer`): a bounded
//!   single-slot channel with keep-newest semantics. The camera producer
//!   never blocks; a frame produced while a cycle is active replaces the
//!   undelivered one, which is counted as dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, RecvError, Sender, TrySendError};

/// One planar YUV camera frame.
///
/// The luma plane is full resolution; the two chroma planes are subsampled
/// 2x2 (quarter size), V and U kept separate. The converter interleaves them
/// into NV21 order when building a bitmap.
pub struct RawFrame {
    y: Vec<u8>,
    v: Vec<u8>,
    u: Vec<u8>,
    width: u32,
    height: u32,
    sequence: u64,
}

impl RawFrame {
    /// Create a frame from its three planes. Plane lengths must match the
    /// declared dimensions, and dimensions must be even (2x2 chroma
    /// subsampling).
    pub fn new(
        y: Vec<u8>,
        v: Vec<u8>,
        u: Vec<u8>,
        width: u32,
        height: u32,
        sequence: u64,
    ) -> Result<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(anyhow!(
                "frame dimensions must be even and non-zero, got {}x{}",
                width,
                height
            ));
        }
        let luma_len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        let chroma_len = luma_len / 4;
        if y.len() != luma_len {
            return Err(anyhow!(
                "luma plane length mismatch: expected {}, got {}",
                luma_len,
                y.len()
            ));
        }
        if v.len() != chroma_len || u.len() != chroma_len {
            return Err(anyhow!(
                "chroma plane length mismatch: expected {}, got {}/{}",
                chroma_len,
                v.len(),
                u.len()
            ));
        }
        Ok(Self {
            y,
            v,
            u,
            width,
            height,
            sequence,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Monotonic capture sequence number, assigned by the source.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn luma(&self) -> &[u8] {
        &self.y
    }

    pub fn chroma_v(&self) -> &[u8] {
        &self.v
    }

    pub fn chroma_u(&self) -> &[u8] {
        &self.u
    }
}

/// Create a connected producer/consumer pair over a single-slot channel.
///
/// Semantics required by the camera collaborator: "keep only latest". The
/// producer overwrites an undelivered frame instead of blocking or queueing;
/// the consumer blocks until a frame (the newest one) is available. Dropping
/// the producer disconnects the slot and ends the consumer loop.
pub fn frame_slot() -> (FrameProducer, FrameConsumer) {
    let (tx, rx) = bounded(1);
    let dropped = Arc::new(AtomicU64::new(0));
    let consumer_alive = Arc::new(AtomicBool::new(true));
    (
        FrameProducer {
            tx,
            rx: rx.clone(),
            dropped: dropped.clone(),
            consumer_alive: consumer_alive.clone(),
        },
        FrameConsumer {
            rx,
            dropped,
            alive: consumer_alive,
        },
    )
}

/// Producer half of the frame slot. Single producer only; `offer` relies on
/// no other sender competing for the freed slot.
pub struct FrameProducer {
    tx: Sender<RawFrame>,
    rx: Receiver<RawFrame>,
    dropped: Arc<AtomicU64>,
    // The eviction receiver keeps the channel alive from the sender's point
    // of view, so consumer shutdown is tracked with an explicit flag.
    consumer_alive: Arc<AtomicBool>,
}

impl FrameProducer {
    /// Offer a frame, replacing any undelivered one. Returns false when the
    /// consumer is gone.
    pub fn offer(&self, frame: RawFrame) -> bool {
        if !self.consumer_alive.load(Ordering::Acquire) {
            return false;
        }
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                // The consumer may race us to the stale frame; either way it
                // leaves the slot, and only an actual eviction counts as a
                // drop.
                if self.rx.try_recv().is_ok() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                self.tx.try_send(frame).is_ok()
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Frames overwritten before delivery.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half of the frame slot.
pub struct FrameConsumer {
    rx: Receiver<RawFrame>,
    dropped: Arc<AtomicU64>,
    alive: Arc<AtomicBool>,
}

impl Drop for FrameConsumer {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

impl FrameConsumer {
    /// Block until the newest undelivered frame arrives, or the producer
    /// disconnects.
    pub fn recv(&self) -> Result<RawFrame, RecvError> {
        self.rx.recv()
    }

    pub fn try_recv(&self) -> Option<RawFrame> {
        self.rx.try_recv().ok()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(sequence: u64) -> RawFrame {
        RawFrame::new(vec![128; 16], vec![128; 4], vec![128; 4], 4, 4, sequence).unwrap()
    }

    #[test]
    fn rejects_mismatched_planes() {
        assert!(RawFrame::new(vec![0; 15], vec![0; 4], vec![0; 4], 4, 4, 0).is_err());
        assert!(RawFrame::new(vec![0; 16], vec![0; 3], vec![0; 4], 4, 4, 0).is_err());
        assert!(RawFrame::new(vec![0; 12], vec![0; 3], vec![0; 3], 3, 4, 0).is_err());
    }

    #[test]
    fn slot_keeps_newest_frame() {
        let (producer, consumer) = frame_slot();

        assert!(producer.offer(test_frame(1)));
        assert!(producer.offer(test_frame(2)));
        assert!(producer.offer(test_frame(3)));

        let frame = consumer.recv().unwrap();
        assert_eq!(frame.sequence(), 3);
        assert_eq!(producer.dropped_frames(), 2);
    }

    #[test]
    fn slot_disconnects_when_producer_dropped() {
        let (producer, consumer) = frame_slot();
        producer.offer(test_frame(1));
        drop(producer);

        assert_eq!(consumer.recv().unwrap().sequence(), 1);
        assert!(consumer.recv().is_err());
    }

    #[test]
    fn offer_fails_without_consumer() {
        let (producer, consumer) = frame_slot();
        drop(consumer);
        assert!(!producer.offer(test_frame(1)));
    }
}
