//! Voice I/O module
//!
//! Handles push-to-talk capture, the device seams and playback.

mod backend;
mod buffer;
mod capture;
mod console;
mod device;
mod playback;

pub use backend::{CpalInput, CpalOutput, DeviceInfo, list_devices};
pub use buffer::{AudioChunk, AudioFormat, RecordingBuffer, SAMPLE_RATE, f32_to_i16, samples_to_wav};
pub use capture::{AudioCapture, CaptureOutcome, CaptureState, SILENT_UTTERANCE};
pub use console::{Console, KeyCommand, Prompt, TerminalConsole, map_key};
pub use device::{
    DeviceMessage, FrameReceiver, FrameTap, InputDevice, InputStream, OutputDevice, PcmOutput,
    frame_channel,
};
pub use playback::{PlaybackQueue, PlaybackSink, STALL_TIMEOUT};
