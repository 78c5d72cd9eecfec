// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod types;
mod error;
mod provider;
mod openai_compat;
mod mock;
mod client;

pub use types::*;
pub use error::ModelError;
pub use provider::{ModelProvider, ResponseStream};
pub use openai_compat::OpenAiProvider;
pub use mock::{MockProvider, ScriptedMockProvider};
pub use client::{clamp_temperature, ChatStream, StreamingChatClient, TEMPERATURE_RANGE};

use std::sync::Arc;

use hagent_config::{ConfigError, EndpointSection};

/// Construct a shared [`ModelProvider`] from the `[endpoint]` section.
///
/// Provider selection:
/// - `"openai"` → [`OpenAiProvider`]; the endpoint must validate first, so an
///   empty key, model or base URL fails here without touching the network
/// - `"mock"` → [`MockProvider`] (echo-back)
pub fn from_config(cfg: &EndpointSection) -> Result<Arc<dyn ModelProvider>, ConfigError> {
    match cfg.provider.as_str() {
        "openai" => {
            let endpoint = cfg.resolve()?;
            Ok(Arc::new(OpenAiProvider::from_endpoint(&endpoint)))
        }
        "mock" => Ok(Arc::new(MockProvider)),
        other => Err(ConfigError::UnknownProvider(other.to_string())),
    }
}

impl StreamingChatClient {
    /// Client for whichever provider the `[endpoint]` section selects.
    pub fn from_config(cfg: &EndpointSection) -> Result<Self, ConfigError> {
        Ok(Self::new(from_config(cfg)?, cfg.timeout()))
    }
}
