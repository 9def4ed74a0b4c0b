//! Turns a window of session history into one upstream completion call.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::provider::LlmProvider;
use crate::session;
use crate::types::{FinishReason, Message, Role};

/// Fixed per-deployment parameters for every upstream call.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// How many of the most recent history messages are forwarded.
    pub history_window: usize,
    pub system_prompt: String,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl From<&ChatConfig> for CompletionSettings {
    fn from(cfg: &ChatConfig) -> Self {
        Self {
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            history_window: cfg.history_window,
            system_prompt: cfg.system_prompt.clone(),
        }
    }
}

pub struct CompletionGateway {
    provider: Arc<dyn LlmProvider>,
    settings: CompletionSettings,
}

impl CompletionGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: CompletionSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Build the upstream message list: the system prompt followed by the
    /// user/assistant turns among the last `history_window` messages.
    /// Older turns are dropped, not summarized.
    pub fn build_prompt(&self, history: &[Message]) -> Vec<Message> {
        let window = session::recent(history, self.settings.history_window);

        let mut messages = Vec::with_capacity(window.len() + 1);
        messages.push(Message::system(self.settings.system_prompt.clone()));
        messages.extend(
            window
                .iter()
                .filter(|m| matches!(m.role, Role::User | Role::Assistant))
                .cloned(),
        );
        messages
    }

    /// Ask the upstream API for the next assistant turn.
    pub async fn complete(&self, history: &[Message]) -> Result<String, ChatError> {
        let messages = self.build_prompt(history);
        debug!(
            "Completing with {} ({} of {} history messages)",
            self.provider.name(),
            messages.len() - 1,
            history.len()
        );

        let response = self
            .provider
            .chat(
                &messages,
                &self.settings.model,
                self.settings.max_tokens,
                self.settings.temperature,
            )
            .await
            .map_err(|e| {
                warn!("Upstream completion failed: {}", e);
                ChatError::Upstream(e)
            })?;

        let usage = &response.usage;
        let Some(choice) = response.choices.into_iter().next() else {
            warn!("Upstream returned no choices");
            return Err(ChatError::EmptyResponse);
        };

        debug!(
            "Upstream {} reply: finish_reason={:?}, tokens prompt={} completion={} total={}",
            choice.role,
            choice.finish_reason,
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens
        );
        if choice.finish_reason == Some(FinishReason::Length) {
            warn!(
                "Upstream reply hit the {} token limit and was cut short",
                self.settings.max_tokens
            );
        }

        Ok(choice.content)
    }
}
