// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::{Config, ConfigError};

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/hagent/config.toml"));

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/hagent/config.toml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("hagent/config.toml"));
    }

    paths.push(PathBuf::from(".hagent/config.toml"));
    paths.push(PathBuf::from("hagent.toml"));

    paths
}

/// Load configuration by merging all discovered TOML files, then applying
/// environment overrides.  The `extra` argument may provide an explicit path
/// (e.g. `--config` CLI flag).
///
/// Endpoint validation is not performed here; call
/// [`Config::endpoint`] to obtain a validated [`crate::EndpointConfig`].
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = toml::Value::Table(toml::map::Map::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            merge_toml(&mut merged, read_layer(&path)?);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        merge_toml(&mut merged, read_layer(p)?);
    }

    let mut config: Config = merged.try_into().context("invalid configuration")?;
    apply_env(&mut config)?;
    Ok(config)
}

fn read_layer(path: &Path) -> anyhow::Result<toml::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Apply `LLM_*` and `SEARCH_API_KEY` overrides from the process environment.
pub fn apply_env(config: &mut Config) -> Result<(), ConfigError> {
    apply_env_from(config, |name| std::env::var(name).ok())
}

/// Apply environment overrides using `get` as the variable source.
///
/// Empty values are ignored.  Recognised variables: `LLM_API_KEY`,
/// `LLM_MODEL_ID`, `LLM_BASE_URL`, `LLM_TIMEOUT`, `SEARCH_API_KEY`.
pub fn apply_env_from<F>(config: &mut Config, get: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| get(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("LLM_API_KEY") {
        config.endpoint.api_key = Some(v);
    }
    if let Some(v) = get("LLM_MODEL_ID") {
        config.endpoint.model_id = Some(v);
    }
    if let Some(v) = get("LLM_BASE_URL") {
        config.endpoint.base_url = Some(v);
    }
    if let Some(v) = get("LLM_TIMEOUT") {
        let secs = v
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidEnv { var: "LLM_TIMEOUT", value: v.clone() })?;
        config.endpoint.timeout_secs = Some(secs);
    }
    if let Some(v) = get("SEARCH_API_KEY") {
        config.search.api_key = Some(v);
    }
    Ok(())
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_toml(dst: &mut toml::Value, src: toml::Value) {
    match (dst, src) {
        (toml::Value::Table(d), toml::Value::Table(s)) => {
            for (k, v) in s {
                let entry = d.entry(k).or_insert(toml::Value::Table(toml::map::Map::new()));
                merge_toml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
