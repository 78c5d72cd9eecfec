// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! One request/response cycle against a chat-completion endpoint.
//!
//! [`StreamingChatClient`] turns a provider's raw event stream into
//! [`StreamChunk`]s (pull-style via [`ChatStream`], or push-style via
//! [`StreamingChatClient::complete`]) and a final [`CompletionResult`].
//!
//! Guarantees:
//! - chunks are delivered in transport order and the final text is their
//!   exact concatenation;
//! - transport, timeout and protocol failures never discard text that was
//!   already delivered: they end the stream and are reported in
//!   [`CompletionResult::error`];
//! - the whole call, connection included, is bounded by one deadline;
//! - nothing is retried here.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use hagent_config::EndpointConfig;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::{
    provider::ResponseStream, CompletionRequest, CompletionResult, Message, ModelError,
    ModelProvider, OpenAiProvider, ResponseEvent, StreamChunk, Usage,
};

/// Accepted sampling temperature range.  Values outside it are clamped.
pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);

pub struct StreamingChatClient {
    provider: Arc<dyn ModelProvider>,
    timeout: Duration,
}

impl StreamingChatClient {
    pub fn new(provider: Arc<dyn ModelProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Client for an OpenAI-compatible endpoint.
    pub fn from_endpoint(endpoint: &EndpointConfig) -> Self {
        Self::new(Arc::new(OpenAiProvider::from_endpoint(endpoint)), endpoint.timeout())
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a completion and return a pull-style chunk stream.
    ///
    /// The only error returned here is [`ModelError::EmptyConversation`].
    /// Connection failures produce a [`ChatStream`] that is already finished
    /// and reports the error from [`ChatStream::finish`].
    pub async fn open(
        &self,
        conversation: &[Message],
        temperature: f32,
    ) -> Result<ChatStream, ModelError> {
        if conversation.is_empty() {
            return Err(ModelError::EmptyConversation);
        }
        let temperature = clamp_temperature(temperature);
        let deadline = Instant::now() + self.timeout;

        debug!(
            provider = self.provider.name(),
            model = self.provider.model_name(),
            turns = conversation.len(),
            temperature,
            "opening completion stream"
        );

        let req = CompletionRequest {
            messages: conversation.to_vec(),
            temperature,
            stream: true,
        };

        let mut stream = ChatStream {
            inner: None,
            text: String::new(),
            usage: None,
            error: None,
            deadline,
            timeout: self.timeout,
        };
        match timeout_at(deadline, self.provider.complete(req)).await {
            Ok(Ok(inner)) => stream.inner = Some(inner),
            Ok(Err(e)) => stream.fail(e),
            Err(_) => stream.fail(ModelError::Timeout(self.timeout)),
        }
        Ok(stream)
    }

    /// Run a completion to the end, handing every chunk to `on_chunk` as it
    /// arrives.
    pub async fn complete<F>(
        &self,
        conversation: &[Message],
        temperature: f32,
        mut on_chunk: F,
    ) -> Result<CompletionResult, ModelError>
    where
        F: FnMut(&StreamChunk) + Send,
    {
        let mut stream = self.open(conversation, temperature).await?;
        while let Some(chunk) = stream.next_chunk().await {
            on_chunk(&chunk);
        }
        Ok(stream.finish())
    }
}

/// Clamp into [`TEMPERATURE_RANGE`]; non-finite values become the lower bound.
pub fn clamp_temperature(t: f32) -> f32 {
    let (lo, hi) = TEMPERATURE_RANGE;
    if !t.is_finite() {
        warn!(temperature = %t, "non-finite temperature, using {lo}");
        return lo;
    }
    let clamped = t.clamp(lo, hi);
    if clamped != t {
        warn!(requested = t, clamped, "temperature outside {lo}..={hi}, clamped");
    }
    clamped
}

/// A single-pass, in-flight completion.
pub struct ChatStream {
    /// `None` once the stream has ended, normally or not.
    inner: Option<ResponseStream>,
    text: String,
    usage: Option<Usage>,
    error: Option<ModelError>,
    deadline: Instant,
    timeout: Duration,
}

impl ChatStream {
    /// Next non-empty chunk, or `None` once the stream has ended.
    pub async fn next_chunk(&mut self) -> Option<StreamChunk> {
        loop {
            let inner = self.inner.as_mut()?;
            let next = match timeout_at(self.deadline, inner.next()).await {
                Ok(next) => next,
                Err(_) => {
                    self.fail(ModelError::Timeout(self.timeout));
                    return None;
                }
            };
            match next {
                Some(Ok(ResponseEvent::TextDelta(delta))) => {
                    if delta.is_empty() {
                        continue;
                    }
                    self.text.push_str(&delta);
                    return Some(StreamChunk { delta });
                }
                Some(Ok(ResponseEvent::Usage { input_tokens, output_tokens })) => {
                    self.usage = Some(Usage { input_tokens, output_tokens });
                }
                Some(Ok(ResponseEvent::Done)) => {
                    self.inner = None;
                    return None;
                }
                Some(Err(e)) => {
                    self.fail(e);
                    return None;
                }
                None => {
                    self.fail(ModelError::Protocol(
                        "stream ended without an end-of-stream signal".into(),
                    ));
                    return None;
                }
            }
        }
    }

    /// Text received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_none()
    }

    /// Consume the stream into its result.  A stream that was not read to
    /// the end is reported as [`ModelError::Cancelled`].
    pub fn finish(mut self) -> CompletionResult {
        if self.inner.is_some() {
            self.fail(ModelError::Cancelled);
        }
        CompletionResult { text: self.text, usage: self.usage, error: self.error }
    }

    fn fail(&mut self, err: ModelError) {
        warn!(error = %err, partial_len = self.text.len(), "completion stream ended early");
        self.inner = None;
        self.error = Some(err);
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
