// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Model call failures.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by providers and the streaming client.
///
/// `Transport` and `Timeout` are network-class failures; `Api` and
/// `Protocol` mean the endpoint answered with something unusable.  None of
/// them are retried by the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("conversation must contain at least one turn")]
    EmptyConversation,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("model call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Non-success HTTP status.
    #[error("endpoint returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// Malformed or unexpected response shape.
    #[error("malformed response: {0}")]
    Protocol(String),

    /// The caller stopped reading before the stream ended.
    #[error("completion abandoned before the stream ended")]
    Cancelled,
}

impl ModelError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::Protocol(_))
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ModelError::Protocol(err.to_string())
        } else {
            ModelError::Transport(err.to_string())
        }
    }
}
