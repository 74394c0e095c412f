//! Pushtalk - push-to-talk voice conversations with an AI assistant
//!
//! This library provides the pieces of a push-to-talk loop:
//! - Capture of one utterance at a time under keyboard control
//! - A conversation-scoped playback stream
//! - The boundary to the conversational pipeline (STT, LLM, TTS)
//! - The loop that drives capture, pipeline and playback cycles
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  utterance  ┌──────────────┐  events  ┌──────────────┐
//! │ AudioCapture  │────────────▶│   Pipeline   │─────────▶│ PlaybackSink │
//! │ (space/enter) │             │ STT→LLM→TTS  │          │  (24 kHz)    │
//! └───────────────┘             └──────────────┘          └──────────────┘
//!         ▲                                                      │
//!         └──────────────── Conversation loop ◀──────────────────┘
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod pipeline;
pub mod voice;

pub use config::Config;
pub use conversation::{Conversation, ConversationSummary, LifecycleSink, LogSink};
pub use error::{Error, Result};
pub use pipeline::{
    ConversationRequest, EventStream, LifecycleNotice, OpenAiPipeline, PipelineEvent,
    VoicePipeline,
};
