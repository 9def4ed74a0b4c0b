pub mod openai_compat;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{CompletionResponse, Message};

pub use openai_compat::OpenAiCompatProvider;

/// Trait for chat-completion backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request. Only `role` and `content` of each
    /// message are forwarded.
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Short name used in logs and the health endpoint.
    fn name(&self) -> &str;
}
