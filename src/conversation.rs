//! Conversation loop
//!
//! Runs capture → pipeline → playback cycles, one at a time, until the user
//! terminates. The playback sink is opened once and reused by every cycle;
//! cycles never overlap, so at most one writer ever touches it.

use std::sync::Arc;

use futures::StreamExt;

use crate::config::AudioConfig;
use crate::pipeline::{ConversationRequest, LifecycleNotice, PipelineEvent, VoicePipeline};
use crate::voice::{
    AudioCapture, AudioChunk, AudioFormat, CaptureOutcome, Console, InputDevice, OutputDevice,
    PlaybackSink, Prompt, RecordingBuffer,
};
use crate::Result;

/// Receives pipeline progress alongside playback
///
/// Called inline between playback writes, so implementations must return
/// quickly.
pub trait LifecycleSink {
    /// A lifecycle notice arrived
    fn notice(&mut self, notice: LifecycleNotice);

    /// An audio chunk was handed to playback
    fn audio(&mut self, _chunk: &AudioChunk) {}

    /// The pipeline failed mid-cycle
    fn failure(&mut self, _error: &crate::Error) {}
}

/// Lifecycle sink that reports through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl LifecycleSink for LogSink {
    fn notice(&mut self, notice: LifecycleNotice) {
        tracing::info!(event = %notice, "received lifecycle event");
    }

    fn audio(&mut self, chunk: &AudioChunk) {
        tracing::debug!(samples = chunk.len(), "received audio");
    }

    fn failure(&mut self, error: &crate::Error) {
        tracing::warn!(error = %error, "cycle failed");
    }
}

/// Counts from one conversation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversationSummary {
    /// Utterances submitted to the pipeline
    pub cycles: usize,
    /// Cycles that ended with a recoverable error
    pub failed_cycles: usize,
}

/// Push-to-talk conversation with an external pipeline
pub struct Conversation {
    capture: AudioCapture,
    output: Box<dyn OutputDevice>,
    pipeline: Arc<dyn VoicePipeline>,
    console: Box<dyn Console>,
    lifecycle: Box<dyn LifecycleSink>,
    format: AudioFormat,
}

impl Conversation {
    /// Assemble a conversation from its devices and pipeline
    #[must_use]
    pub fn new(
        input: Box<dyn InputDevice>,
        output: Box<dyn OutputDevice>,
        pipeline: Arc<dyn VoicePipeline>,
        console: Box<dyn Console>,
        audio: &AudioConfig,
    ) -> Self {
        Self {
            capture: AudioCapture::new(input, audio),
            output,
            pipeline,
            console,
            lifecycle: Box::new(LogSink),
            format: audio.format(),
        }
    }

    /// Replace the default [`LogSink`]
    #[must_use]
    pub fn with_lifecycle_sink(mut self, sink: Box<dyn LifecycleSink>) -> Self {
        self.lifecycle = sink;
        self
    }

    /// Run until the user terminates
    ///
    /// # Errors
    ///
    /// Returns error if a device cannot be opened or input fails; pipeline
    /// and playback errors only fail the current cycle
    #[allow(clippy::future_not_send)]
    pub async fn run(&mut self) -> Result<ConversationSummary> {
        let mut sink = PlaybackSink::open(self.output.as_ref(), self.format)?;
        let mut summary = ConversationSummary::default();

        loop {
            let outcome = self.capture.capture_one_utterance(self.console.as_mut())?;
            let CaptureOutcome::Utterance(buffer) = outcome else {
                tracing::info!(cycles = summary.cycles, "conversation ended");
                break;
            };

            summary.cycles += 1;
            if let Err(e) = self.run_cycle(buffer, &mut sink).await {
                if e.is_fatal() {
                    return Err(e);
                }
                summary.failed_cycles += 1;
                self.lifecycle.failure(&e);
            }

            self.console.show(&Prompt::NextTurn);
        }

        sink.close();
        Ok(summary)
    }

    /// Submit one utterance and play the response as it streams in
    #[allow(clippy::future_not_send)]
    async fn run_cycle(&mut self, buffer: RecordingBuffer, sink: &mut PlaybackSink) -> Result<()> {
        tracing::info!(
            samples = buffer.len(),
            duration_ms = buffer.duration().as_millis(),
            "submitting utterance"
        );

        let mut events = self.pipeline.run(ConversationRequest::new(buffer)).await?;

        while let Some(event) = events.next().await {
            match event? {
                PipelineEvent::Audio(chunk) => {
                    sink.write(&chunk)?;
                    self.lifecycle.audio(&chunk);
                }
                PipelineEvent::Lifecycle(notice) => self.lifecycle.notice(notice),
            }
        }

        Ok(())
    }
}
