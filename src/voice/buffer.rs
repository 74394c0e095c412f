//! Audio sample containers shared by capture, playback and the pipeline

use std::time::Duration;

use crate::{Error, Result};

/// Sample rate for both capture and playback
pub const SAMPLE_RATE: u32 = 24_000;

/// Fixed sample rate and channel count of a device stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
}

impl AudioFormat {
    /// Mono stream at the given rate
    #[must_use]
    pub const fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }

    /// Number of mono samples covering `duration`
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn samples_for(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * f64::from(self.sample_rate)).round() as usize
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::mono(SAMPLE_RATE)
    }
}

/// Ordered concatenation of every frame batch captured during one
/// recording interval (mono, f32)
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl RecordingBuffer {
    /// Create an empty buffer
    #[must_use]
    pub const fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
        }
    }

    /// Wrap already captured samples
    #[must_use]
    pub const fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A buffer of zeros lasting `duration`
    #[must_use]
    pub fn silence(sample_rate: u32, duration: Duration) -> Self {
        let len = AudioFormat::mono(sample_rate).samples_for(duration);
        Self::from_samples(vec![0.0; len], sample_rate)
    }

    /// Append one frame batch
    pub fn append(&mut self, batch: &[f32]) {
        self.samples.extend_from_slice(batch);
    }

    /// Drop everything captured so far
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Captured samples in delivery order
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consume the buffer, returning its samples
    #[must_use]
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample rate of the buffer
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Playing time of the buffer
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn duration(&self) -> Duration {
        let nanos = self.samples.len() as u128 * 1_000_000_000 / u128::from(self.sample_rate.max(1));
        Duration::from_nanos(nanos as u64)
    }

    /// Empty, or every sample exactly zero
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0.0)
    }

    /// Encode as a 16-bit mono WAV file for transcription APIs
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        samples_to_wav(&self.samples, self.sample_rate)
    }
}

/// One piece of synthesized speech (mono, 16-bit)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioChunk {
    samples: Vec<i16>,
}

impl AudioChunk {
    /// Wrap synthesized samples
    #[must_use]
    pub const fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Samples in playback order
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the chunk carries no audio
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl From<Vec<i16>> for AudioChunk {
    fn from(samples: Vec<i16>) -> Self {
        Self::new(samples)
    }
}

/// Convert f32 samples to WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(f32_to_i16(sample))
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Convert an f32 sample in [-1.0, 1.0] to i16
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}
