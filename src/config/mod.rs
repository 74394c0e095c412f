//! Configuration management
//!
//! Precedence is env > toml > default for every field.

pub mod file;

use std::path::Path;
use std::time::Duration;

use crate::voice::{AudioFormat, SAMPLE_RATE};
use crate::{Error, Result};

use self::file::PushtalkConfigFile;

/// Default system prompt for the assistant
pub const DEFAULT_INSTRUCTIONS: &str = "You're speaking to a human, so be polite and concise. \
     Maintain conversation context across multiple exchanges.";

/// Runtime configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Audio device configuration
    pub audio: AudioConfig,

    /// Conversational pipeline configuration
    pub pipeline: PipelineConfig,
}

/// Audio device configuration
///
/// Capture and playback always run at [`SAMPLE_RATE`] mono; synthesized
/// speech arrives at that rate, so it is not configurable.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// How long each key poll waits before checking the device again
    pub poll_interval: Duration,
}

impl AudioConfig {
    /// Stream format for capture and playback
    #[must_use]
    #[allow(clippy::unused_self)]
    pub const fn format(&self) -> AudioFormat {
        AudioFormat::mono(SAMPLE_RATE)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Conversational pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// API key (`OPENAI_API_KEY`)
    pub api_key: Option<String>,

    /// API base URL
    pub base_url: String,

    /// Transcription model
    pub stt_model: String,

    /// Chat model
    pub llm_model: String,

    /// Speech synthesis model
    pub tts_model: String,

    /// Speech synthesis voice
    pub tts_voice: String,

    /// System prompt for the assistant
    pub instructions: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            stt_model: "gpt-4o-transcribe".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            tts_model: "gpt-4o-mini-tts".to_string(),
            tts_voice: "ash".to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment and a TOML file
    ///
    /// Uses `path` when given, otherwise the standard config file location.
    ///
    /// # Errors
    ///
    /// Returns error if the resolved values are invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = path.map_or_else(file::load_config_file, file::load_config_file_at);
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Resolve a config file against an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the resolved values are invalid
    pub fn resolve<F>(fc: PushtalkConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults_audio = AudioConfig::default();
        let audio = AudioConfig {
            poll_interval: env("PUSHTALK_POLL_INTERVAL_MS")
                .and_then(|s| s.parse().ok())
                .or(fc.audio.poll_interval_ms)
                .map_or(defaults_audio.poll_interval, Duration::from_millis),
        };

        if audio.poll_interval.is_zero() {
            return Err(Error::Config(
                "audio.poll_interval_ms must be positive".to_string(),
            ));
        }

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            api_key: env("OPENAI_API_KEY")
                .or(fc.pipeline.api_key)
                .filter(|k| !k.is_empty()),
            base_url: env("PUSHTALK_BASE_URL")
                .or(fc.pipeline.base_url)
                .unwrap_or(defaults.base_url),
            stt_model: env("PUSHTALK_STT_MODEL")
                .or(fc.pipeline.stt_model)
                .unwrap_or(defaults.stt_model),
            llm_model: env("PUSHTALK_LLM_MODEL")
                .or(fc.pipeline.llm_model)
                .unwrap_or(defaults.llm_model),
            tts_model: env("PUSHTALK_TTS_MODEL")
                .or(fc.pipeline.tts_model)
                .unwrap_or(defaults.tts_model),
            tts_voice: env("PUSHTALK_TTS_VOICE")
                .or(fc.pipeline.tts_voice)
                .unwrap_or(defaults.tts_voice),
            instructions: fc.pipeline.instructions.unwrap_or(defaults.instructions),
        };

        Ok(Self { audio, pipeline })
    }
}
