//! Conversational pipeline boundary
//!
//! A pipeline turns one utterance into a finite stream of audio chunks and
//! lifecycle notices. Multi-turn memory belongs to the pipeline.

mod openai;

use std::fmt;

use futures::stream::BoxStream;

pub use openai::{OpenAiPipeline, PcmDecoder};

use crate::Result;
use crate::voice::{AudioChunk, RecordingBuffer};

/// One finalized utterance submitted to a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRequest {
    buffer: RecordingBuffer,
}

impl ConversationRequest {
    /// Wrap a finalized recording
    #[must_use]
    pub const fn new(buffer: RecordingBuffer) -> Self {
        Self { buffer }
    }

    /// The recorded utterance
    #[must_use]
    pub const fn buffer(&self) -> &RecordingBuffer {
        &self.buffer
    }

    /// Consume the request, returning the recording
    #[must_use]
    pub fn into_buffer(self) -> RecordingBuffer {
        self.buffer
    }
}

/// Progress signal from the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleNotice {
    /// The pipeline started producing a response turn
    TurnStarted,
    /// The response turn is fully delivered
    TurnEnded,
    /// No further events follow for this request
    SessionEnded,
    /// Any other label a pipeline reports
    Other(String),
}

impl LifecycleNotice {
    /// Notice for a wire label
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "turn_started" => Self::TurnStarted,
            "turn_ended" => Self::TurnEnded,
            "session_ended" => Self::SessionEnded,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire label of the notice
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::TurnStarted => "turn_started",
            Self::TurnEnded => "turn_ended",
            Self::SessionEnded => "session_ended",
            Self::Other(label) => label,
        }
    }
}

impl From<&str> for LifecycleNotice {
    fn from(label: &str) -> Self {
        Self::from_label(label)
    }
}

impl fmt::Display for LifecycleNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Event produced by a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Synthesized speech to play
    Audio(AudioChunk),
    /// Out-of-band progress signal
    Lifecycle(LifecycleNotice),
}

/// Lazy, finite, non-restartable response to one request
pub type EventStream = BoxStream<'static, Result<PipelineEvent>>;

/// External conversational service
#[async_trait::async_trait]
pub trait VoicePipeline: Send + Sync {
    /// Submit one utterance and return its response events
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be started; errors while the
    /// response streams arrive as stream items
    async fn run(&self, request: ConversationRequest) -> Result<EventStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_labels() {
        assert_eq!(LifecycleNotice::TurnStarted.to_string(), "turn_started");
        assert_eq!(LifecycleNotice::TurnEnded.label(), "turn_ended");
        assert_eq!(LifecycleNotice::SessionEnded.label(), "session_ended");
    }

    #[test]
    fn known_labels_parse_to_variants() {
        assert_eq!(LifecycleNotice::from_label("turn_ended"), LifecycleNotice::TurnEnded);
        assert_eq!(LifecycleNotice::from("session_ended"), LifecycleNotice::SessionEnded);
    }

    #[test]
    fn unknown_labels_are_kept() {
        let notice = LifecycleNotice::from_label("tool_call_started");
        assert_eq!(notice, LifecycleNotice::Other("tool_call_started".to_string()));
        assert_eq!(notice.label(), "tool_call_started");
        assert_eq!(notice.to_string(), "tool_call_started");
    }
}
