// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Invalid or incomplete configuration.  Always raised at construction time,
/// before any network traffic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required endpoint field is empty or unset.
    #[error("endpoint configuration is incomplete: `{0}` is empty or unset")]
    Missing(&'static str),

    #[error("endpoint timeout must be a positive number of seconds")]
    InvalidTimeout,

    #[error("base URL `{0}` must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("unknown model provider: {0}")]
    UnknownProvider(String),

    /// An environment override could not be parsed.
    #[error("environment variable {var} has invalid value `{value}`")]
    InvalidEnv { var: &'static str, value: String },
}
