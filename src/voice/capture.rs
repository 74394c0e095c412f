//! Push-to-talk audio capture from microphone
//!
//! [`AudioCapture::capture_one_utterance`] opens one capture stream, runs
//! the toggle state machine until the user either finishes an utterance or
//! terminates, and closes the stream on every exit path.
//!
//! The device callback only copies frames into a channel (see
//! [`super::device::FrameTap`]). Frames are tagged with the recording
//! interval they were captured in, and the session only appends frames
//! tagged with its current interval, so batches captured while paused, or
//! belonging to an interval that was abandoned, never reach the buffer.
//! Stopping waits for callbacks still delivering, so the drain right after
//! a stop sees every batch of the interval, including on an empty stop.

use std::time::Duration;

use super::buffer::{AudioFormat, RecordingBuffer};
use super::console::{Console, KeyCommand, Prompt};
use super::device::{DeviceMessage, FrameReceiver, InputDevice, InputStream, frame_channel};
use crate::Result;
use crate::config::AudioConfig;

/// Length of the silence submitted in place of a silent utterance
pub const SILENT_UTTERANCE: Duration = Duration::from_secs(1);

/// Toggle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Stream open, frames dropped
    Idle,
    /// Frames appended to the recording buffer
    Recording,
    /// Terminate requested; absorbing
    Terminating,
}

/// Result of one capture call
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// A finalized, non-empty utterance
    Utterance(RecordingBuffer),
    /// The user ended the conversation
    Terminate,
}

/// Captures utterances from an input device
pub struct AudioCapture {
    device: Box<dyn InputDevice>,
    format: AudioFormat,
    poll_interval: Duration,
}

impl AudioCapture {
    /// Create a capture front end for `device`
    #[must_use]
    pub fn new(device: Box<dyn InputDevice>, config: &AudioConfig) -> Self {
        Self {
            device,
            format: config.format(),
            poll_interval: config.poll_interval,
        }
    }

    /// Format capture streams are opened with
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Record one utterance under user control
    ///
    /// Only one capture may run at a time; the `&mut` console enforces
    /// that for a single control surface.
    ///
    /// # Errors
    ///
    /// Returns error if the input device cannot be opened or the console
    /// stops delivering input
    pub fn capture_one_utterance(&self, console: &mut dyn Console) -> Result<CaptureOutcome> {
        let (tap, frames) = frame_channel();
        let stream = self.device.open(self.format, tap)?;
        let mut session = CaptureSession::new(stream, frames, self.format.sample_rate);

        console.enter()?;
        let result = session.run(console, self.poll_interval);
        session.close();
        console.leave();

        match result? {
            CaptureOutcome::Utterance(buffer) if buffer.is_silent() => {
                tracing::warn!(
                    samples = buffer.len(),
                    "no audio detected, substituting silence"
                );
                console.show(&Prompt::SilentUtterance);
                Ok(CaptureOutcome::Utterance(RecordingBuffer::silence(
                    self.format.sample_rate,
                    SILENT_UTTERANCE,
                )))
            }
            outcome => Ok(outcome),
        }
    }
}

/// State of one `capture_one_utterance` call
struct CaptureSession {
    state: CaptureState,
    buffer: RecordingBuffer,
    frames: FrameReceiver,
    /// Recording interval whose frames are accepted
    interval: Option<u64>,
    stream: Option<Box<dyn InputStream>>,
}

impl CaptureSession {
    fn new(stream: Box<dyn InputStream>, frames: FrameReceiver, sample_rate: u32) -> Self {
        Self {
            state: CaptureState::Idle,
            buffer: RecordingBuffer::new(sample_rate),
            frames,
            interval: None,
            stream: Some(stream),
        }
    }

    fn run(&mut self, console: &mut dyn Console, poll_interval: Duration) -> Result<CaptureOutcome> {
        console.show(&Prompt::Ready);

        loop {
            let key = console.poll_key(poll_interval)?;
            self.drain(console);

            match key {
                Some(KeyCommand::Toggle) => {
                    if let Some(buffer) = self.toggle(console) {
                        return Ok(CaptureOutcome::Utterance(buffer));
                    }
                }
                Some(KeyCommand::Terminate) => {
                    self.terminate();
                    console.show(&Prompt::Terminated);
                    return Ok(CaptureOutcome::Terminate);
                }
                None => {}
            }
        }
    }

    /// Flip Idle/Recording; returns the finalized buffer when an utterance
    /// ends with audio in it
    fn toggle(&mut self, console: &mut dyn Console) -> Option<RecordingBuffer> {
        match self.state {
            CaptureState::Idle => {
                self.buffer.clear();
                self.interval = Some(self.frames.start_recording());
                self.state = CaptureState::Recording;
                tracing::debug!(interval = ?self.interval, "recording started");
                console.show(&Prompt::Recording);
                None
            }
            CaptureState::Recording => {
                self.frames.stop_recording();
                self.drain(console);
                self.state = CaptureState::Idle;
                console.show(&Prompt::Processing);

                if self.buffer.is_empty() {
                    self.interval = None;
                    tracing::debug!("recording stopped with no audio");
                    console.show(&Prompt::NothingRecorded);
                    return None;
                }

                self.close();

                let sample_rate = self.buffer.sample_rate();
                let buffer = std::mem::replace(&mut self.buffer, RecordingBuffer::new(sample_rate));
                self.interval = None;
                tracing::info!(
                    samples = buffer.len(),
                    duration_ms = buffer.duration().as_millis(),
                    "utterance captured"
                );
                Some(buffer)
            }
            CaptureState::Terminating => None,
        }
    }

    fn terminate(&mut self) {
        self.frames.stop_recording();
        self.interval = None;
        self.state = CaptureState::Terminating;
        self.close();
        self.buffer.clear();
        tracing::debug!("capture terminated");
    }

    /// Move queued device messages into the buffer or the log
    fn drain(&mut self, console: &mut dyn Console) {
        while let Some(message) = self.frames.try_next() {
            match message {
                DeviceMessage::Frames { epoch, samples } if Some(epoch) == self.interval => {
                    self.buffer.append(&samples);
                }
                DeviceMessage::Frames { epoch, samples } => {
                    tracing::trace!(epoch, samples = samples.len(), "dropping stale frames");
                }
                DeviceMessage::Status(status) => {
                    tracing::warn!(status = %status, "input device status");
                    console.show(&Prompt::DeviceStatus(status));
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}
