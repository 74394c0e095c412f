//! Speech-to-text, chat and text-to-speech over the `OpenAI` HTTP API

use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{ConversationRequest, EventStream, LifecycleNotice, PipelineEvent, VoicePipeline};
use crate::config::PipelineConfig;
use crate::voice::{AudioChunk, RecordingBuffer};
use crate::{Error, Result};

/// Response from the transcription API
#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Voice pipeline backed by the `OpenAI` API
///
/// Keeps the conversation history across requests, so every turn is
/// answered with the full exchange as context.
pub struct OpenAiPipeline {
    client: reqwest::Client,
    api_key: String,
    config: PipelineConfig,
    history: Mutex<Vec<ChatMessage>>,
}

impl OpenAiPipeline {
    /// Create a pipeline from configuration
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("OPENAI_API_KEY required for the voice pipeline".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            config,
            history: Mutex::new(Vec::new()),
        })
    }

    /// Number of messages remembered so far
    pub async fn history_len(&self) -> usize {
        self.history.lock().await.len()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Transcribe the utterance
    async fn transcribe(&self, buffer: &RecordingBuffer) -> Result<String> {
        let audio = buffer.to_wav()?;
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Pipeline(e.to_string()))?,
            )
            .text("model", self.config.stt_model.clone());

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Pipeline(format!("transcription error {status}: {body}")));
        }

        let result: TranscriptionResponse = response.json().await?;
        Ok(result.text)
    }

    /// Ask the chat model for a reply, remembering both sides on success
    async fn respond(&self, transcript: &str) -> Result<String> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
        }

        let mut history = self.history.lock().await;
        let user = ChatMessage::new("user", transcript);
        let messages = build_messages(&self.config.instructions, &history, &user);

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.config.llm_model,
                messages: &messages,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Pipeline(format!("chat error {status}: {body}")));
        }

        let result: ChatResponse = response.json().await?;
        let reply = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Pipeline("chat response had no choices".to_string()))?;

        history.push(user);
        history.push(ChatMessage::new("assistant", &reply));
        Ok(reply)
    }

    /// Start speech synthesis; the body streams raw 24 kHz s16le PCM
    async fn speak(&self, text: &str) -> Result<reqwest::Response> {
        #[derive(Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
        }

        let response = self
            .client
            .post(self.url("audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &self.config.tts_model,
                input: text,
                voice: &self.config.tts_voice,
                response_format: "pcm",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Pipeline(format!("speech error {status}: {body}")));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl VoicePipeline for OpenAiPipeline {
    async fn run(&self, request: ConversationRequest) -> Result<EventStream> {
        let transcript = self.transcribe(request.buffer()).await?;
        tracing::info!(transcript = %transcript, "transcription complete");

        let started = stream::iter([Ok(PipelineEvent::Lifecycle(LifecycleNotice::TurnStarted))]);
        let ended = stream::iter([
            Ok(PipelineEvent::Lifecycle(LifecycleNotice::TurnEnded)),
            Ok(PipelineEvent::Lifecycle(LifecycleNotice::SessionEnded)),
        ]);

        if transcript.trim().is_empty() {
            tracing::debug!("empty transcription, nothing to answer");
            return Ok(started.chain(ended).boxed());
        }

        let reply = self.respond(&transcript).await?;
        tracing::debug!(response_len = reply.len(), "assistant responded");

        let response = self.speak(&reply).await?;
        let mut decoder = PcmDecoder::default();
        let audio = response
            .bytes_stream()
            .map_err(Error::from)
            .map_ok(move |bytes| decoder.push(&bytes))
            .try_filter(|chunk| futures::future::ready(!chunk.is_empty()))
            .map_ok(PipelineEvent::Audio);

        Ok(started.chain(audio).chain(ended).boxed())
    }
}

/// System prompt, prior turns, then the new user message
fn build_messages(instructions: &str, history: &[ChatMessage], user: &ChatMessage) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::new("system", instructions));
    messages.extend_from_slice(history);
    messages.push(user.clone());
    messages
}

/// Splits a little-endian 16-bit PCM byte stream into sample chunks,
/// carrying an odd trailing byte over to the next push
#[derive(Debug, Default)]
pub struct PcmDecoder {
    pending: Option<u8>,
}

impl PcmDecoder {
    /// Decode the next slice of the byte stream
    pub fn push(&mut self, bytes: &[u8]) -> AudioChunk {
        let mut data = Vec::with_capacity(bytes.len() + 1);
        data.extend(self.pending.take());
        data.extend_from_slice(bytes);

        let mut pairs = data.chunks_exact(2);
        let samples = pairs
            .by_ref()
            .map(|p| i16::from_le_bytes([p[0], p[1]]))
            .collect();
        self.pending = pairs.remainder().first().copied();

        AudioChunk::new(samples)
    }

    /// Whether half a sample is waiting for its second byte
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}
