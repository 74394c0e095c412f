//! cpal device backend on the default host

use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
    SupportedStreamConfig, SupportedStreamConfigRange,
};

use super::buffer::AudioFormat;
use super::device::{FrameTap, InputDevice, InputStream, OutputDevice, PcmOutput};
use super::playback::{PlaybackQueue, STALL_TIMEOUT};
use crate::{Error, Result};

/// Extra time allowed for the device to drain beyond the queued audio
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Default microphone
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalInput;

/// Default speaker
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalOutput;

impl InputDevice for CpalInput {
    fn open(&self, format: AudioFormat, tap: FrameTap) -> Result<Box<dyn InputStream>> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceOpen("no input device available".to_string()))?;

        let ranges = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceOpen(e.to_string()))?;
        let supported = pick_config(ranges, format)
            .ok_or_else(|| Error::DeviceOpen("no suitable input config found".to_string()))?;
        let config = supported.config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = format.sample_rate,
            channels = config.channels,
            sample_format = ?supported.sample_format(),
            "audio capture initialized"
        );

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_input::<f32>(&device, &config, tap)?,
            SampleFormat::I16 => build_input::<i16>(&device, &config, tap)?,
            other => {
                return Err(Error::DeviceOpen(format!(
                    "unsupported input sample format {other:?}"
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::DeviceOpen(e.to_string()))?;
        tracing::debug!("audio capture started");

        Ok(Box::new(CpalInputStream {
            stream: Some(stream),
        }))
    }
}

impl OutputDevice for CpalOutput {
    fn open(&self, format: AudioFormat) -> Result<Box<dyn PcmOutput>> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::DeviceOpen("no output device available".to_string()))?;

        let ranges = device
            .supported_output_configs()
            .map_err(|e| Error::DeviceOpen(e.to_string()))?;
        let supported = pick_config(ranges, format)
            .ok_or_else(|| Error::DeviceOpen("no suitable output config found".to_string()))?;
        let config = supported.config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = format.sample_rate,
            channels = config.channels,
            sample_format = ?supported.sample_format(),
            "audio playback initialized"
        );

        // One second of headroom between the writer and the device
        let queue = Arc::new(PlaybackQueue::new(
            format.samples_for(Duration::from_secs(1)),
        ));

        let stream = match supported.sample_format() {
            SampleFormat::I16 => build_output::<i16>(&device, &config, Arc::clone(&queue))?,
            SampleFormat::F32 => build_output::<f32>(&device, &config, Arc::clone(&queue))?,
            other => {
                return Err(Error::DeviceOpen(format!(
                    "unsupported output sample format {other:?}"
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::DeviceOpen(e.to_string()))?;

        Ok(Box::new(CpalPcmOutput {
            stream: Some(stream),
            queue,
            format,
        }))
    }
}

struct CpalInputStream {
    stream: Option<Stream>,
}

impl InputStream for CpalInputStream {
    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        self.close();
    }
}

struct CpalPcmOutput {
    stream: Option<Stream>,
    queue: Arc<PlaybackQueue>,
    format: AudioFormat,
}

impl PcmOutput for CpalPcmOutput {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        if self.stream.is_none() {
            return Err(Error::Audio("playback stream is closed".to_string()));
        }
        self.queue.push(samples, STALL_TIMEOUT)
    }

    fn close(&mut self) -> Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };

        let pending = self.queue.len();
        let pending_ms = (pending as u64 * 1000) / u64::from(self.format.sample_rate.max(1));
        let drained = self
            .queue
            .wait_drained(Duration::from_millis(pending_ms) + DRAIN_GRACE);

        drop(stream);

        if drained {
            Ok(())
        } else {
            Err(Error::Audio(format!(
                "{} samples left unplayed at close",
                self.queue.len()
            )))
        }
    }
}

impl Drop for CpalPcmOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Prefer a range matching the requested channel count, else any range
/// covering the sample rate
fn pick_config<I>(ranges: I, format: AudioFormat) -> Option<SupportedStreamConfig>
where
    I: Iterator<Item = SupportedStreamConfigRange>,
{
    let rate = SampleRate(format.sample_rate);
    let mut fallback = None;

    for range in ranges {
        if range.min_sample_rate() > rate || range.max_sample_rate() < rate {
            continue;
        }
        if range.channels() == format.channels {
            return Some(range.with_sample_rate(rate));
        }
        if fallback.is_none() {
            fallback = Some(range.with_sample_rate(rate));
        }
    }

    fallback
}

fn build_input<T>(device: &Device, config: &StreamConfig, tap: FrameTap) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let status_tap = tap.clone();
    let mut mono: Vec<f32> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                mono.clear();
                mono.extend(data.chunks(channels).map(downmix));
                tap.deliver(&mono);
            },
            move |err| {
                status_tap.report(err.to_string());
            },
            None,
        )
        .map_err(|e| Error::DeviceOpen(e.to_string()))
}

/// Average one interleaved frame down to a mono f32 sample
#[allow(clippy::cast_precision_loss)]
fn downmix<T>(frame: &[T]) -> f32
where
    T: Sample,
    f32: FromSample<T>,
{
    let sum: f32 = frame.iter().map(|&s| f32::from_sample(s)).sum();
    sum / frame.len().max(1) as f32
}

fn build_output<T>(device: &Device, config: &StreamConfig, queue: Arc<PlaybackQueue>) -> Result<Stream>
where
    T: SizedSample + FromSample<i16>,
{
    let channels = usize::from(config.channels.max(1));

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                queue.fill(data, channels);
            },
            |err| {
                tracing::warn!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::DeviceOpen(e.to_string()))
}

/// Name and role of an audio device on the default host
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device name as reported by the host
    pub name: String,
    /// Whether this is the host's default device for its direction
    pub is_default: bool,
    /// Whether the device captures (true) or plays (false)
    pub is_input: bool,
}

/// List input and output devices on the default host
///
/// # Errors
///
/// Returns error if the host cannot enumerate devices
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    let mut infos = Vec::new();

    for device in host
        .input_devices()
        .map_err(|e| Error::DeviceOpen(e.to_string()))?
    {
        let name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
        infos.push(DeviceInfo {
            is_default: default_input.as_deref() == Some(name.as_str()),
            name,
            is_input: true,
        });
    }

    for device in host
        .output_devices()
        .map_err(|e| Error::DeviceOpen(e.to_string()))?
    {
        let name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
        infos.push(DeviceInfo {
            is_default: default_output.as_deref() == Some(name.as_str()),
            name,
            is_input: false,
        });
    }

    Ok(infos)
}
