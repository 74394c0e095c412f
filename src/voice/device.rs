//! Device stream seams
//!
//! Capture devices push frames through a [`FrameTap`] from their own
//! callback context. The tap never blocks: it copies the device slice,
//! tags it with the recording epoch that was current when the callback ran
//! and hands it to the control thread over a channel. The control thread
//! owns the [`FrameReceiver`] and flips the epoch to start and stop
//! recording.
//!
//! Stopping is a barrier: once [`FrameReceiver::stop_recording`] returns,
//! every batch tagged with the closed epoch is already in the channel, so
//! a single drain afterwards sees the whole interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use super::buffer::AudioFormat;
use crate::Result;

/// Message from a device callback to the control thread
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMessage {
    /// One batch of mono samples captured during recording epoch `epoch`
    Frames {
        /// Recording interval the batch belongs to
        epoch: u64,
        /// Copied samples
        samples: Vec<f32>,
    },
    /// Non-fatal device status report (overflow, xrun, backend error)
    Status(String),
}

/// Recording epoch plus the number of callbacks currently delivering
#[derive(Debug, Default)]
struct Gate {
    epoch: AtomicU64,
    in_flight: AtomicUsize,
}

/// Producer half of the capture handoff, owned by the device callback
#[derive(Debug, Clone)]
pub struct FrameTap {
    gate: Arc<Gate>,
    tx: mpsc::Sender<DeviceMessage>,
}

impl FrameTap {
    /// Deliver one batch of mono samples
    ///
    /// Batches delivered while recording is paused are dropped here, in the
    /// callback, so nothing outside a recording interval is ever queued.
    pub fn deliver(&self, samples: &[f32]) {
        // Announce before reading the epoch; stop_recording waits on this
        self.gate.in_flight.fetch_add(1, Ordering::SeqCst);
        let epoch = self.gate.epoch.load(Ordering::SeqCst);
        if is_recording_epoch(epoch) {
            // Receiver gone means the session already finished
            let _ = self.tx.send(DeviceMessage::Frames {
                epoch,
                samples: samples.to_vec(),
            });
        }
        self.gate.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Report a device status condition
    pub fn report(&self, status: impl Into<String>) {
        let _ = self.tx.send(DeviceMessage::Status(status.into()));
    }

    /// Whether batches delivered right now would be kept
    #[must_use]
    pub fn is_recording(&self) -> bool {
        is_recording_epoch(self.gate.epoch.load(Ordering::SeqCst))
    }
}

/// Consumer half of the capture handoff, owned by the capture session
#[derive(Debug)]
pub struct FrameReceiver {
    gate: Arc<Gate>,
    rx: mpsc::Receiver<DeviceMessage>,
}

impl FrameReceiver {
    /// Open a new recording interval and return its epoch
    pub fn start_recording(&self) -> u64 {
        let current = self.gate.epoch.load(Ordering::SeqCst);
        if is_recording_epoch(current) {
            return current;
        }
        self.gate.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Close the current recording interval
    ///
    /// Returns once no callback that could have seen the closed epoch is
    /// still delivering. Callbacks only copy and send, so the wait is short.
    pub fn stop_recording(&self) {
        let current = self.gate.epoch.load(Ordering::SeqCst);
        if !is_recording_epoch(current) {
            return;
        }
        self.gate.epoch.fetch_add(1, Ordering::SeqCst);
        while self.gate.in_flight.load(Ordering::SeqCst) != 0 {
            thread::yield_now();
        }
    }

    /// Next queued message, if any
    #[must_use]
    pub fn try_next(&self) -> Option<DeviceMessage> {
        self.rx.try_recv().ok()
    }
}

/// Create a connected tap/receiver pair, initially paused
#[must_use]
pub fn frame_channel() -> (FrameTap, FrameReceiver) {
    let gate = Arc::new(Gate::default());
    let (tx, rx) = mpsc::channel();
    (
        FrameTap {
            gate: Arc::clone(&gate),
            tx,
        },
        FrameReceiver { gate, rx },
    )
}

const fn is_recording_epoch(epoch: u64) -> bool {
    epoch % 2 == 1
}

/// Source of capture streams (a microphone)
pub trait InputDevice {
    /// Open and start a capture stream that feeds `tap`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DeviceOpen`] if the device cannot be opened
    fn open(&self, format: AudioFormat, tap: FrameTap) -> Result<Box<dyn InputStream>>;
}

/// An open capture stream
///
/// Dropping the stream must close it as well.
pub trait InputStream {
    /// Stop the device and release it; no callback runs after this returns
    fn close(&mut self);
}

/// Source of playback streams (a speaker)
pub trait OutputDevice {
    /// Open and start a playback stream
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DeviceOpen`] if the device cannot be opened
    fn open(&self, format: AudioFormat) -> Result<Box<dyn PcmOutput>>;
}

/// An open playback stream accepting 16-bit mono samples
pub trait PcmOutput {
    /// Blocking, in-order write
    ///
    /// # Errors
    ///
    /// Returns error if the device stops accepting samples
    fn write(&mut self, samples: &[i16]) -> Result<()>;

    /// Flush and release the device
    ///
    /// # Errors
    ///
    /// Returns error if the device could not be released cleanly
    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_tap_drops_frames() {
        let (tap, frames) = frame_channel();
        assert!(!tap.is_recording());

        tap.deliver(&[0.5; 4]);
        assert!(frames.try_next().is_none());
    }

    #[test]
    fn frames_carry_their_epoch() {
        let (tap, frames) = frame_channel();

        let first = frames.start_recording();
        tap.deliver(&[0.1]);
        frames.stop_recording();
        tap.deliver(&[0.2]);
        let second = frames.start_recording();
        tap.deliver(&[0.3]);

        assert_ne!(first, second);
        assert_eq!(
            frames.try_next(),
            Some(DeviceMessage::Frames {
                epoch: first,
                samples: vec![0.1]
            })
        );
        assert_eq!(
            frames.try_next(),
            Some(DeviceMessage::Frames {
                epoch: second,
                samples: vec![0.3]
            })
        );
        assert!(frames.try_next().is_none());
    }

    #[test]
    fn start_is_idempotent_while_recording() {
        let (_tap, frames) = frame_channel();
        let epoch = frames.start_recording();
        assert_eq!(frames.start_recording(), epoch);

        frames.stop_recording();
        frames.stop_recording();
        assert_eq!(frames.start_recording(), epoch + 2);
    }

    #[test]
    fn status_passes_while_paused() {
        let (tap, frames) = frame_channel();
        tap.report("input overflow");
        assert_eq!(
            frames.try_next(),
            Some(DeviceMessage::Status("input overflow".to_string()))
        );
    }

    #[test]
    fn stop_waits_for_in_flight_batches() {
        use std::sync::atomic::AtomicBool;
        use std::time::Duration;

        let (tap, frames) = frame_channel();
        let running = Arc::new(AtomicBool::new(true));
        let producer = {
            let running = Arc::clone(&running);
            thread::spawn(move || {
                while running.load(Ordering::SeqCst) {
                    tap.deliver(&[0.25; 64]);
                }
            })
        };

        let epoch = frames.start_recording();
        thread::sleep(Duration::from_millis(50));
        frames.stop_recording();

        let mut recorded = 0;
        while let Some(message) = frames.try_next() {
            if let DeviceMessage::Frames { epoch: e, .. } = message {
                assert_eq!(e, epoch);
                recorded += 1;
            }
        }
        assert!(recorded > 0);

        // Nothing from the closed interval may show up after the drain
        thread::sleep(Duration::from_millis(20));
        running.store(false, Ordering::SeqCst);
        producer.join().unwrap();
        assert!(frames.try_next().is_none());
    }
}
