//! Audio playback to speakers
//!
//! One [`PlaybackSink`] stays open for a whole conversation. Chunks are
//! rendered in the order they are written; the device callback pulls them
//! from a bounded [`PlaybackQueue`] and plays silence on underrun.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use cpal::{FromSample, Sample};
use parking_lot::{Condvar, Mutex};

use super::buffer::{AudioChunk, AudioFormat};
use super::device::{OutputDevice, PcmOutput};
use crate::{Error, Result};

/// How long a full queue may go without the device pulling samples
pub const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Bounded FIFO between blocking writers and the output callback
#[derive(Debug)]
pub struct PlaybackQueue {
    samples: Mutex<VecDeque<i16>>,
    changed: Condvar,
    capacity: usize,
}

impl PlaybackQueue {
    /// Create a queue holding at most `capacity` samples
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            changed: Condvar::new(),
            capacity,
        }
    }

    /// Append samples, blocking while the queue is full
    ///
    /// # Errors
    ///
    /// Returns error if the queue stays full for `stall_timeout`
    pub fn push(&self, mut samples: &[i16], stall_timeout: Duration) -> Result<()> {
        let mut queue = self.samples.lock();

        while !samples.is_empty() {
            let space = self.capacity - queue.len();
            if space == 0 {
                let waited = self.changed.wait_for(&mut queue, stall_timeout);
                if waited.timed_out() && queue.len() == self.capacity {
                    return Err(Error::Audio("playback device stalled".to_string()));
                }
                continue;
            }

            let take = space.min(samples.len());
            queue.extend(&samples[..take]);
            samples = &samples[take..];
        }

        Ok(())
    }

    /// Fill interleaved output frames, duplicating each sample across
    /// `channels`; frames past the end of the queue are silent
    pub fn fill<T>(&self, out: &mut [T], channels: usize)
    where
        T: Sample + FromSample<i16>,
    {
        let mut queue = self.samples.lock();
        for frame in out.chunks_mut(channels.max(1)) {
            let value = queue.pop_front().map_or(T::EQUILIBRIUM, T::from_sample);
            frame.fill(value);
        }
        drop(queue);
        self.changed.notify_all();
    }

    /// Wait until every queued sample was pulled, up to `timeout`
    ///
    /// Returns whether the queue drained
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.samples.lock();
        while !queue.is_empty() {
            if self.changed.wait_until(&mut queue, deadline).timed_out() {
                return queue.is_empty();
            }
        }
        true
    }

    /// Samples waiting to be played
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Whether nothing is waiting to be played
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

/// Conversation-scoped playback stream
pub struct PlaybackSink {
    output: Option<Box<dyn PcmOutput>>,
    format: AudioFormat,
    written: usize,
}

impl PlaybackSink {
    /// Open and start the playback device
    ///
    /// # Errors
    ///
    /// Returns error if the output device cannot be opened
    pub fn open(device: &dyn OutputDevice, format: AudioFormat) -> Result<Self> {
        let output = device.open(format)?;
        tracing::debug!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "playback sink opened"
        );
        Ok(Self {
            output: Some(output),
            format,
            written: 0,
        })
    }

    /// Write one chunk, blocking until the device accepted it
    ///
    /// # Errors
    ///
    /// Returns error if the sink was closed or the device stalled
    pub fn write(&mut self, chunk: &AudioChunk) -> Result<()> {
        let output = self
            .output
            .as_mut()
            .ok_or_else(|| Error::Audio("playback sink is closed".to_string()))?;

        if chunk.is_empty() {
            return Ok(());
        }

        output.write(chunk.samples())?;
        self.written += chunk.len();
        tracing::trace!(samples = chunk.len(), total = self.written, "chunk written");
        Ok(())
    }

    /// Close the device; later calls do nothing
    pub fn close(&mut self) {
        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.close() {
                tracing::warn!(error = %e, "failed to close playback device");
            }
            tracing::debug!(samples = self.written, "playback sink closed");
        }
    }

    /// Whether the device is still open
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.output.is_some()
    }

    /// Format the device was opened with
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Total samples written since opening
    #[must_use]
    pub const fn samples_written(&self) -> usize {
        self.written
    }
}

impl Drop for PlaybackSink {
    fn drop(&mut self) {
        self.close();
    }
}
