//! TOML configuration file loading
//!
//! Supports `~/.config/pushtalk/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct PushtalkConfigFile {
    /// Audio device configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Conversational pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineFileConfig,
}

/// Audio device configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Key poll interval in milliseconds
    pub poll_interval_ms: Option<u64>,
}

/// Conversational pipeline configuration
#[derive(Debug, Default, Deserialize)]
pub struct PipelineFileConfig {
    /// API key (overridden by `OPENAI_API_KEY`)
    pub api_key: Option<String>,

    /// API base URL
    pub base_url: Option<String>,

    /// Transcription model
    pub stt_model: Option<String>,

    /// Chat model
    pub llm_model: Option<String>,

    /// Speech synthesis model
    pub tts_model: Option<String>,

    /// Speech synthesis voice
    pub tts_voice: Option<String>,

    /// System prompt for the assistant
    pub instructions: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `PushtalkConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> PushtalkConfigFile {
    config_file_path().map_or_else(PushtalkConfigFile::default, |path| {
        load_config_file_at(&path)
    })
}

/// Load the TOML config file from an explicit path
///
/// Same fallback behavior as [`load_config_file`].
pub fn load_config_file_at(path: &Path) -> PushtalkConfigFile {
    if !path.exists() {
        return PushtalkConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                PushtalkConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            PushtalkConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/pushtalk/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("pushtalk").join("config.toml"))
}
