use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

/// The result of executing a tool.
///
/// `content` is always plain text and is fed back to the model as an
/// observation, whether or not the tool succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    /// If true, the tool execution failed non-fatally (returned error message).
    pub is_error: bool,
}

impl ToolOutput {
    /// Successful plain-text result.
    pub fn ok(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false }
    }

    /// Error result containing a plain-text error message.
    pub fn err(msg: impl Into<String>) -> Self {
        Self { content: msg.into(), is_error: true }
    }
}

/// Trait that every built-in and user-defined tool must implement.
///
/// Tools take free text and answer with text.  They never fail outright:
/// problems are reported through [`ToolOutput::err`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses in `Action: <name>[...]`.
    fn name(&self) -> &str;
    /// One-line description shown in the capability listing.
    fn description(&self) -> &str;
    async fn invoke(&self, input: &str) -> ToolOutput;
}

type ToolFn = Arc<dyn Fn(String) -> BoxFuture<'static, ToolOutput> + Send + Sync>;

/// A tool backed by an async closure.
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    f: ToolFn,
}

impl FnTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolOutput> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            f: Arc::new(move |input| f(input).boxed()),
        }
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool").field("name", &self.name).finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, input: &str) -> ToolOutput {
        (self.f)(input.to_string()).await
    }
}
