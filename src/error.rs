//! Error types for the push-to-talk loop

use thiserror::Error;

/// Result type alias for pushtalk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a conversation
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Capture or playback device could not be opened
    #[error("audio device unavailable: {0}")]
    DeviceOpen(String),

    /// Audio error on an already open device
    #[error("audio error: {0}")]
    Audio(String),

    /// Terminal input error
    #[error("input error: {0}")]
    Input(String),

    /// Conversational pipeline error
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether this error aborts the whole conversation
    ///
    /// Without a microphone, a speaker or a keyboard there is no way to
    /// continue; everything else is confined to the current cycle.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceOpen(_) | Self::Input(_) | Self::Config(_))
    }
}
