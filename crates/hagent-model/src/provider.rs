use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::{CompletionRequest, ModelError, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<ResponseEvent, ModelError>> + Send>>;

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for logs.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return a streaming response.
    ///
    /// The stream yields events in transport order and should end with
    /// [`ResponseEvent::Done`]; a stream that ends without it is treated as
    /// truncated by [`crate::StreamingChatClient`].
    async fn complete(&self, req: CompletionRequest) -> Result<ResponseStream, ModelError>;
}
