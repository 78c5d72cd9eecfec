use serde::{Deserialize, Serialize};

use crate::ModelError;

// ─── Message types ────────────────────────────────────────────────────────────

/// A single turn in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: text.into() }
    }

    /// An observation produced by a tool.
    pub fn tool(text: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: text.into() }
    }

    pub fn as_text(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Requests and streamed events ────────────────────────────────────────────

/// Request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub stream: bool,
}

/// A single streamed event from the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    /// A text delta streamed from the model.  May be empty.
    TextDelta(String),
    /// Token usage, when the provider reports it
    Usage { input_tokens: u32, output_tokens: u32 },
    /// The stream finished normally
    Done,
}

/// An incremental unit of model output, delivered to observers in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub delta: String,
}

/// Token usage from one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The terminal artifact of one model invocation.
///
/// `text` is always the exact concatenation of every chunk delivered during
/// the call, even when the call failed part-way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResult {
    pub text: String,
    pub usage: Option<Usage>,
    /// Why the stream stopped early, if it did.
    pub error: Option<ModelError>,
}

impl CompletionResult {
    pub fn was_truncated_by_error(&self) -> bool {
        self.error.is_some()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
