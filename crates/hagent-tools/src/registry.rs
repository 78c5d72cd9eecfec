// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use thiserror::Error;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

use crate::{FnTool, Tool, ToolOutput};

/// Name and description of a registered tool, as shown to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolListing {
    pub name: String,
    pub description: String,
}

/// Returned by [`ToolRegistry::register`] when a name was already taken.
/// The new tool has replaced the old one; this is informational only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tool '{name}' registered twice; the earlier registration was replaced")]
pub struct DuplicateToolWarning {
    pub name: String,
}

/// Central registry holding all available tools.
///
/// Tools are kept in registration order.  Re-registering a name replaces the
/// tool in place, so the listing order is that of first registration.
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Option<DuplicateToolWarning> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Option<DuplicateToolWarning> {
        let name = tool.name().to_string();
        self.tools.insert(name.clone(), tool)?;
        let warning = DuplicateToolWarning { name };
        warn!(tool = %warning.name, "{warning}");
        Some(warning)
    }

    /// Register an async closure as a tool.
    pub fn register_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        f: F,
    ) -> Option<DuplicateToolWarning>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolOutput> + Send + 'static,
    {
        self.register(FnTool::new(name, description, f))
    }

    /// `None` means no tool of that name exists.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list_available(&self) -> Vec<ToolListing> {
        self.tools
            .values()
            .map(|t| ToolListing {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// One `- <name>: <description>` line per tool.
    pub fn render_listing(&self) -> String {
        self.tools
            .values()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool on its own task, bounded by `timeout`.
    ///
    /// Returns `None` only for an unknown name.  A tool that times out or
    /// panics yields an error-flagged observation.  Dropping the returned
    /// future aborts the tool task.
    pub async fn invoke(&self, name: &str, input: &str, timeout: Duration) -> Option<ToolOutput> {
        let tool = self.lookup(name)?;
        let input = input.to_string();
        debug!(tool = name, input_len = input.len(), "invoking tool");

        let task = tokio::spawn(async move { tool.invoke(&input).await });
        let mut handle = AbortOnDropHandle::new(task);
        let output = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.is_panic() => {
                warn!(tool = name, "tool panicked");
                ToolOutput::err(format!("Tool '{name}' failed unexpectedly."))
            }
            Ok(Err(e)) => ToolOutput::err(format!("Tool '{name}' was aborted: {e}")),
            Err(_) => {
                handle.abort();
                warn!(tool = name, timeout = ?timeout, "tool timed out");
                ToolOutput::err(format!("Tool '{name}' timed out after {timeout:?}."))
            }
        };
        Some(output)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    /// Minimal no-op tool for registry tests.
    struct EchoTool {
        name: &'static str,
        description: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            self.description
        }
        async fn invoke(&self, input: &str) -> ToolOutput {
            ToolOutput::ok(format!("echo:{input}"))
        }
    }

    fn echo(name: &'static str) -> EchoTool {
        EchoTool { name, description: "echoes its input" }
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = ToolRegistry::new();
        assert!(reg.register(echo("echo")).is_none());
        assert!(reg.lookup("echo").is_some());
    }

    #[test]
    fn lookup_unknown_returns_none() {
        let reg = ToolRegistry::new();
        assert!(reg.lookup("nope").is_none());
    }

    #[test]
    fn listing_keeps_registration_order() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("zeta"));
        reg.register(echo("alpha"));
        let names: Vec<_> = reg.list_available().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn duplicate_registration_replaces_in_place_and_warns() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "t", description: "old" });
        reg.register(echo("other"));
        let warning = reg.register(EchoTool { name: "t", description: "new" });

        assert_eq!(warning, Some(DuplicateToolWarning { name: "t".into() }));
        assert_eq!(reg.len(), 2);
        let listing = reg.list_available();
        assert_eq!(listing[0], ToolListing { name: "t".into(), description: "new".into() });
        assert_eq!(listing[1].name, "other");
    }

    #[test]
    fn render_listing_format() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "Search", description: "web search" });
        reg.register(EchoTool { name: "Calc", description: "arithmetic" });
        assert_eq!(reg.render_listing(), "- Search: web search\n- Calc: arithmetic");
    }

    #[test]
    fn empty_registry_renders_empty_listing() {
        assert_eq!(ToolRegistry::new().render_listing(), "");
    }

    #[tokio::test]
    async fn invoke_known_tool_succeeds() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("echo"));
        let out = reg.invoke("echo", "hi", Duration::from_secs(1)).await.unwrap();
        assert_eq!(out, ToolOutput::ok("echo:hi"));
    }

    #[tokio::test]
    async fn invoke_unknown_tool_returns_none() {
        let reg = ToolRegistry::new();
        assert!(reg.invoke("missing", "x", Duration::from_secs(1)).await.is_none());
    }

    #[tokio::test]
    async fn closure_tools_can_report_errors() {
        let mut reg = ToolRegistry::new();
        reg.register_fn("fail", "always fails", |_input| async {
            ToolOutput::err("backend unavailable")
        });
        let out = reg.invoke("fail", "x", Duration::from_secs(1)).await.unwrap();
        assert!(out.is_error);
        assert_eq!(out.content, "backend unavailable");
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let mut reg = ToolRegistry::new();
        reg.register_fn("slow", "never returns", |_input| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            ToolOutput::ok("too late")
        });
        let out = reg.invoke("slow", "x", Duration::from_millis(20)).await.unwrap();
        assert!(out.is_error);
        assert_eq!(out.content, "Tool 'slow' timed out after 20ms.");
    }

    #[tokio::test(start_paused = true)]
    async fn whole_second_timeout_message() {
        let mut reg = ToolRegistry::new();
        reg.register_fn("slow", "never returns", |_input| async {
            std::future::pending::<()>().await;
            ToolOutput::ok("unreachable")
        });
        let out = reg.invoke("slow", "x", Duration::from_secs(2)).await.unwrap();
        assert_eq!(out.content, "Tool 'slow' timed out after 2s.");
    }

    #[tokio::test]
    async fn dropping_invoke_aborts_the_tool() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let mut reg = ToolRegistry::new();
        reg.register_fn("slow", "sets a flag late", move |_input| {
            let flag = flag.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                flag.store(true, Ordering::SeqCst);
                ToolOutput::ok("done")
            }
        });

        let early = tokio::time::timeout(
            Duration::from_millis(20),
            reg.invoke("slow", "x", Duration::from_secs(5)),
        )
        .await;
        assert!(early.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn panicking_tool_becomes_error_observation() {
        let mut reg = ToolRegistry::new();
        reg.register_fn("boom", "panics", |input: String| async move {
            if !input.is_empty() {
                panic!("boom");
            }
            ToolOutput::ok("")
        });
        let out = reg.invoke("boom", "x", Duration::from_secs(1)).await.unwrap();
        assert!(out.is_error);
        assert!(out.content.contains("boom"));
    }
}
