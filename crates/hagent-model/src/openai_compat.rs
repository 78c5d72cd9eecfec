// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Driver for OpenAI-compatible chat completion APIs.
//!
//! Works with any server that speaks the `/chat/completions` SSE streaming
//! wire format (OpenAI, DashScope compatible mode, Ollama, vLLM, ...).
//!
//! The request body is exactly `{model, messages, temperature, stream}`.
//! Tool observations are sent as `user` turns prefixed with `Observation: `
//! because the agent loop drives tools through text directives, not native
//! function calling, and most servers reject `tool` turns without a
//! `tool_call_id`.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use hagent_config::EndpointConfig;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::{
    provider::ResponseStream, CompletionRequest, Message, ModelError, ResponseEvent, Role,
};

/// OpenAI-compatible chat completion provider.
pub struct OpenAiProvider {
    /// Model id forwarded to the API.
    model: String,
    /// API key; `None` for local servers that accept anonymous requests.
    api_key: Option<String>,
    /// Full chat completions URL, e.g. `https://api.openai.com/v1/chat/completions`.
    chat_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Construct a provider.
    ///
    /// `base_url` ends **before** `/chat/completions`, e.g.
    /// `https://api.openai.com/v1`.  `connect_timeout` bounds connection
    /// establishment only; the overall deadline is enforced by
    /// [`crate::StreamingChatClient`] so that partial output survives it.
    pub fn new(
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: &str,
        connect_timeout: Duration,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            model: model.into(),
            api_key,
            chat_url: format!("{base}/chat/completions"),
            client,
        }
    }

    pub fn from_endpoint(endpoint: &EndpointConfig) -> Self {
        Self::new(
            endpoint.model_id(),
            Some(endpoint.api_key().to_string()),
            endpoint.base_url(),
            endpoint.timeout(),
        )
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

#[async_trait]
impl crate::ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> Result<ResponseStream, ModelError> {
        let messages = build_openai_messages(&req.messages);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": req.temperature,
            "stream": req.stream,
        });

        debug!(
            model = %self.model,
            message_count = messages.len(),
            temperature = req.temperature,
            "sending completion request"
        );
        trace!(request_body = ?body, "full completion request");

        let mut http_req = self.client.post(&self.chat_url).json(&body);
        if let Some(key) = &self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let resp = http_req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api { status, body });
        }

        // SSE events can be split across TCP packets, and a multi-byte UTF-8
        // character can be split too.  Buffer raw bytes and decode only
        // complete lines.
        let event_stream = resp
            .bytes_stream()
            .scan(Vec::<u8>::new(), |buf, chunk| {
                let events: Vec<Result<ResponseEvent, ModelError>> = match chunk {
                    Ok(b) => {
                        buf.extend_from_slice(&b);
                        drain_complete_sse_lines(buf)
                    }
                    Err(e) => vec![Err(ModelError::from(e))],
                };
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

/// Drain all complete `\n`-terminated SSE lines from `buf`.
///
/// Any trailing incomplete line is left in `buf` so it can be extended by the
/// next TCP chunk.
pub(crate) fn drain_complete_sse_lines(buf: &mut Vec<u8>) -> Vec<Result<ResponseEvent, ModelError>> {
    let mut events = Vec::new();
    while let Some(nl_pos) = buf.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buf.drain(..=nl_pos).collect();
        let line = String::from_utf8_lossy(&raw[..nl_pos]);
        let line = line.trim_end_matches('\r');
        events.extend(parse_sse_data_line(line));
    }
    events
}

/// Parse a single complete SSE line.
///
/// Blank lines, comments and non-`data:` fields produce no events.
fn parse_sse_data_line(line: &str) -> Vec<Result<ResponseEvent, ModelError>> {
    let Some(data) = line.strip_prefix("data:") else {
        return vec![];
    };
    let data = data.trim();
    if data.is_empty() {
        return vec![];
    }
    if data == "[DONE]" {
        return vec![Ok(ResponseEvent::Done)];
    }
    match serde_json::from_str::<Value>(data) {
        Ok(v) => match parse_sse_chunk(&v) {
            Ok(events) => events.into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        },
        Err(e) => vec![Err(ModelError::Protocol(format!("invalid JSON in stream: {e}")))],
    }
}

/// Convert one decoded chunk object into zero or more events.
///
/// A role-only first chunk and a final chunk that only carries
/// `finish_reason` both yield no text.
fn parse_sse_chunk(v: &Value) -> Result<Vec<ResponseEvent>, ModelError> {
    if let Some(err) = v.get("error").filter(|e| !e.is_null()) {
        let message = err["message"].as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
        return Err(ModelError::Protocol(format!("error event in stream: {message}")));
    }

    let usage = v.get("usage").filter(|u| !u.is_null()).map(|u| ResponseEvent::Usage {
        input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as u32,
    });

    let choices = match v.get("choices").and_then(Value::as_array) {
        Some(c) => c,
        None if usage.is_some() => return Ok(usage.into_iter().collect()),
        None => return Err(ModelError::Protocol(format!("chunk without choices: {v}"))),
    };

    let mut events = Vec::new();
    if let Some(text) = choices
        .first()
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
    {
        if !text.is_empty() {
            events.push(ResponseEvent::TextDelta(text.to_string()));
        }
    }
    events.extend(usage);
    Ok(events)
}

/// Convert a slice of [`Message`]s into the OpenAI wire-format JSON array.
pub(crate) fn build_openai_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| match m.role {
            Role::Tool => json!({
                "role": "user",
                "content": format!("Observation: {}", m.content),
            }),
            role => json!({ "role": role.as_str(), "content": m.content }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelProvider;

    fn drain(s: &str) -> Vec<Result<ResponseEvent, ModelError>> {
        let mut buf = s.as_bytes().to_vec();
        drain_complete_sse_lines(&mut buf)
    }

    #[test]
    fn chat_url_appends_path_and_strips_trailing_slash() {
        let p = OpenAiProvider::new("m", None, "http://localhost:1234/v1/", Duration::from_secs(5));
        assert_eq!(p.chat_url(), "http://localhost:1234/v1/chat/completions");
        assert_eq!(p.name(), "openai");
        assert_eq!(p.model_name(), "m");
    }

    #[test]
    fn text_delta_is_parsed() {
        let events = drain("data: {\"choices\":[{\"delta\":{\"content\":\"hel\"}}]}\n");
        assert_eq!(events, vec![Ok(ResponseEvent::TextDelta("hel".into()))]);
    }

    #[test]
    fn role_only_first_chunk_yields_nothing() {
        let events = drain("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n");
        assert!(events.is_empty());
    }

    #[test]
    fn finish_reason_only_chunk_yields_nothing() {
        let events = drain("data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n");
        assert!(events.is_empty());
    }

    #[test]
    fn done_sentinel_is_parsed() {
        assert_eq!(drain("data: [DONE]\n"), vec![Ok(ResponseEvent::Done)]);
    }

    #[test]
    fn data_without_space_after_colon_is_accepted() {
        assert_eq!(drain("data:[DONE]\n"), vec![Ok(ResponseEvent::Done)]);
    }

    #[test]
    fn invalid_json_is_a_protocol_error() {
        let events = drain("data: {not json\n");
        assert!(matches!(events.as_slice(), [Err(ModelError::Protocol(_))]));
    }

    #[test]
    fn chunk_without_choices_is_a_protocol_error() {
        let events = drain("data: {\"id\":\"x\"}\n");
        assert!(matches!(events.as_slice(), [Err(ModelError::Protocol(_))]));
    }

    #[test]
    fn error_event_is_a_protocol_error() {
        let events = drain("data: {\"error\":{\"message\":\"overloaded\"}}\n");
        match events.as_slice() {
            [Err(ModelError::Protocol(m))] => assert!(m.contains("overloaded")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn usage_only_chunk_produces_usage() {
        let events = drain(
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":3}}\n",
        );
        assert_eq!(
            events,
            vec![Ok(ResponseEvent::Usage { input_tokens: 12, output_tokens: 3 })]
        );
    }

    #[test]
    fn text_and_usage_in_one_chunk_keeps_text_first() {
        let events = drain(
            "data: {\"choices\":[{\"delta\":{\"content\":\"end\"}}],\"usage\":{\"prompt_tokens\":1,\"completion_tokens\":1}}\n",
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Ok(ResponseEvent::TextDelta("end".into())));
    }

    #[test]
    fn comments_and_other_fields_are_ignored() {
        assert!(drain(": keep-alive\nevent: message\n\n").is_empty());
    }

    #[test]
    fn incomplete_line_is_retained() {
        let mut buf = b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\ndata: {\"cho".to_vec();
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 1);
        assert_eq!(buf, b"data: {\"cho");
    }

    #[test]
    fn event_split_across_two_chunks_is_parsed() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"split\"}}]}\n";
        let (a, b) = line.split_at(20);
        let mut buf = Vec::new();
        buf.extend_from_slice(a.as_bytes());
        assert!(drain_complete_sse_lines(&mut buf).is_empty());
        buf.extend_from_slice(b.as_bytes());
        assert_eq!(
            drain_complete_sse_lines(&mut buf),
            vec![Ok(ResponseEvent::TextDelta("split".into()))]
        );
    }

    #[test]
    fn multibyte_character_split_across_chunks_survives() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"你好\"}}]}\n".as_bytes();
        // Split inside the first CJK character (3-byte UTF-8 sequence).
        let cut = line.iter().position(|&b| b >= 0x80).unwrap() + 1;
        let mut buf = line[..cut].to_vec();
        assert!(drain_complete_sse_lines(&mut buf).is_empty());
        buf.extend_from_slice(&line[cut..]);
        assert_eq!(
            drain_complete_sse_lines(&mut buf),
            vec![Ok(ResponseEvent::TextDelta("你好".into()))]
        );
    }

    #[test]
    fn crlf_line_endings_are_handled() {
        assert_eq!(drain("data: [DONE]\r\n"), vec![Ok(ResponseEvent::Done)]);
    }

    #[test]
    fn tool_turns_are_sent_as_user_observations() {
        let wire = build_openai_messages(&[
            Message::system("sys"),
            Message::assistant("Action: Search[x]"),
            Message::tool("no results"),
        ]);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[1]["role"], "assistant");
        assert_eq!(wire[2]["role"], "user");
        assert_eq!(wire[2]["content"], "Observation: no results");
    }
}
