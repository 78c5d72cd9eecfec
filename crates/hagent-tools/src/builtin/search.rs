// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

use async_trait::async_trait;
use hagent_config::SearchConfig;
use serde_json::Value;
use tracing::debug;

use crate::tool::{Tool, ToolOutput};

/// Web search through a SerpApi-compatible JSON endpoint.
pub struct SearchTool {
    config: SearchConfig,
    client: reqwest::Client,
}

impl SearchTool {
    pub fn new(config: SearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("hagent/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    async fn search(&self, query: &str, api_key: &str) -> Result<String, reqwest::Error> {
        let resp = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("engine", self.config.engine.as_str()),
                ("q", query),
                ("api_key", api_key),
                ("gl", self.config.gl.as_str()),
                ("hl", self.config.hl.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let results: Value = resp.json().await?;
        Ok(summarize_results(&results, query))
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "Search"
    }

    fn description(&self) -> &str {
        "A web search engine. Use it for current events, facts, or anything \
         you do not know for certain."
    }

    async fn invoke(&self, input: &str) -> ToolOutput {
        let query = input.trim();
        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return ToolOutput::err("No search API key provided.");
        };

        debug!(query, "search tool");

        match self.search(query, api_key).await {
            Ok(summary) => ToolOutput::ok(summary),
            Err(e) => ToolOutput::err(format!("Error searching: {e}")),
        }
    }
}

/// Reduce a SerpApi result document to one observation.
///
/// The first of these that is present wins: the answer box list, the answer
/// box answer, the knowledge graph description, then up to three organic
/// results.
pub fn summarize_results(results: &Value, query: &str) -> String {
    if let Some(list) = results.get("answer_box_list").and_then(Value::as_array) {
        return list.iter().map(value_text).collect::<Vec<_>>().join("\n");
    }
    if let Some(answer) = results.pointer("/answer_box/answer") {
        return value_text(answer);
    }
    if let Some(desc) = results.pointer("/knowledge_graph/description") {
        return value_text(desc);
    }
    if let Some(organic) = results
        .get("organic_results")
        .and_then(Value::as_array)
        .filter(|r| !r.is_empty())
    {
        return organic
            .iter()
            .take(3)
            .enumerate()
            .map(|(i, r)| {
                let title = r.get("title").and_then(Value::as_str).unwrap_or("");
                let snippet = r.get("snippet").and_then(Value::as_str).unwrap_or("");
                format!("[{}] {title}\n{snippet}", i + 1)
            })
            .collect::<Vec<_>>()
            .join("\n\n");
    }
    format!("Sorry, no relevant information about {query} found.")
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Object(o) => o
            .get("answer")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| v.to_string()),
        other => other.to_string(),
    }
}
