// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default model request timeout when neither the config file nor
/// `LLM_TIMEOUT` sets one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointSection,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    /// Validate the `[endpoint]` section into an [`EndpointConfig`].
    pub fn endpoint(&self) -> Result<EndpointConfig, ConfigError> {
        self.endpoint.resolve()
    }
}

/// Raw, possibly incomplete endpoint settings as read from config files and
/// the environment.  Turned into an [`EndpointConfig`] by [`EndpointSection::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSection {
    /// Driver identifier: `"openai"` (any OpenAI-compatible server) or `"mock"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Explicit API key.  Prefer `api_key_env` in version-controlled files.
    pub api_key: Option<String>,
    /// Environment variable that holds the API key (read at resolve time).
    pub api_key_env: Option<String>,
    /// Model identifier forwarded to the API.
    pub model_id: Option<String>,
    /// API base ending before `/chat/completions`, e.g. `https://api.openai.com/v1`.
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

fn default_provider() -> String {
    "openai".into()
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            api_key_env: None,
            model_id: None,
            base_url: None,
            timeout_secs: None,
        }
    }
}

impl EndpointSection {
    pub fn resolve(&self) -> Result<EndpointConfig, ConfigError> {
        let api_key = self
            .api_key
            .clone()
            .or_else(|| self.api_key_env.as_ref().and_then(|v| std::env::var(v).ok()))
            .unwrap_or_default();
        EndpointConfig::new(
            api_key,
            self.model_id.clone().unwrap_or_default(),
            self.base_url.clone().unwrap_or_default(),
            self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Request timeout, falling back to [`DEFAULT_TIMEOUT_SECS`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

/// Validated, immutable chat-completion endpoint settings.
///
/// Construction fails immediately when any field is empty, so a bad
/// configuration can never reach the transport.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    api_key: String,
    model_id: String,
    base_url: String,
    timeout_secs: u64,
}

impl EndpointConfig {
    pub fn new(
        api_key: impl Into<String>,
        model_id: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        let model_id = model_id.into();
        let base_url = base_url.into();

        if api_key.trim().is_empty() {
            return Err(ConfigError::Missing("api_key"));
        }
        if model_id.trim().is_empty() {
            return Err(ConfigError::Missing("model_id"));
        }
        if base_url.trim().is_empty() {
            return Err(ConfigError::Missing("base_url"));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(Self { api_key, model_id, base_url, timeout_secs })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on planning rounds per request.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Sampling temperature for planning calls (clamped to 0.0–2.0).
    #[serde(default)]
    pub temperature: f32,
    /// Per-invocation deadline for tools.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_max_rounds() -> u32 {
    5
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            temperature: 0.0,
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

impl AgentConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Settings for the web search tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// SerpApi key.  When unset the tool answers with a "no key" observation.
    pub api_key: Option<String>,
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_search_engine")]
    pub engine: String,
    /// Country code (`gl` parameter).
    #[serde(default = "default_search_gl")]
    pub gl: String,
    /// Interface language (`hl` parameter).
    #[serde(default = "default_search_hl")]
    pub hl: String,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_endpoint() -> String {
    "https://serpapi.com/search.json".into()
}

fn default_search_engine() -> String {
    "google".into()
}

fn default_search_gl() -> String {
    "cn".into()
}

fn default_search_hl() -> String {
    "zh-cn".into()
}

fn default_search_timeout_secs() -> u64 {
    15
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_search_endpoint(),
            engine: default_search_engine(),
            gl: default_search_gl(),
            hl: default_search_hl(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        let err = EndpointConfig::new("", "gpt-4o-mini", "https://api.openai.com/v1", 60)
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("api_key"));
    }

    #[test]
    fn whitespace_model_id_is_rejected() {
        let err = EndpointConfig::new("sk", "  ", "https://api.openai.com/v1", 60).unwrap_err();
        assert_eq!(err, ConfigError::Missing("model_id"));
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let err = EndpointConfig::new("sk", "m", "", 60).unwrap_err();
        assert_eq!(err, ConfigError::Missing("base_url"));
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let err = EndpointConfig::new("sk", "m", "ftp://host", 60).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = EndpointConfig::new("sk", "m", "http://localhost:8080/v1", 0).unwrap_err();
        assert_eq!(err, ConfigError::InvalidTimeout);
    }

    #[test]
    fn valid_endpoint_exposes_fields() {
        let cfg = EndpointConfig::new("sk", "qwen-plus", "http://localhost:8080/v1", 30).unwrap();
        assert_eq!(cfg.model_id(), "qwen-plus");
        assert_eq!(cfg.base_url(), "http://localhost:8080/v1");
        assert_eq!(cfg.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let cfg = EndpointConfig::new("sk-secret", "m", "http://h/v1", 30).unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn section_defaults_timeout_to_sixty_seconds() {
        let section = EndpointSection {
            api_key: Some("sk".into()),
            model_id: Some("m".into()),
            base_url: Some("http://h/v1".into()),
            ..EndpointSection::default()
        };
        assert_eq!(section.resolve().unwrap().timeout(), Duration::from_secs(60));
    }

    #[test]
    fn section_without_key_fails_to_resolve() {
        let section = EndpointSection {
            model_id: Some("m".into()),
            base_url: Some("http://h/v1".into()),
            ..EndpointSection::default()
        };
        assert_eq!(section.resolve().unwrap_err(), ConfigError::Missing("api_key"));
    }

    #[test]
    fn agent_defaults() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.max_rounds, 5);
        assert_eq!(cfg.tool_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.temperature, 0.0);
    }

    #[test]
    fn partial_agent_section_fills_defaults() {
        let cfg: Config = toml::from_str("[agent]\nmax_rounds = 9\n").unwrap();
        assert_eq!(cfg.agent.max_rounds, 9);
        assert_eq!(cfg.agent.tool_timeout_secs, 30);
        assert_eq!(cfg.endpoint.provider, "openai");
        assert_eq!(cfg.search.engine, "google");
    }
}
