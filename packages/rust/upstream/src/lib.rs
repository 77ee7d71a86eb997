//! Upstream completion service seam and its OpenAI-compatible client.
//!
//! The chat pipeline depends only on [`CompletionService`]; the concrete
//! [`OpenAiCompatibleClient`] is built once at startup and injected.

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
mod openai;
mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use manualchat_shared::{ContextMessage, Result};

pub use openai::OpenAiCompatibleClient;

/// Lazily produced text fragments, in generation order.
///
/// Dropping the stream abandons the upstream request.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Produces a fragment stream for a composed message list.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Start a generation. An `Err` here means nothing was produced.
    async fn stream_completion(&self, messages: &[ContextMessage]) -> Result<FragmentStream>;
}
