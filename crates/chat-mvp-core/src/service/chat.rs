use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ChatError, ConfigError, ProviderError, Result};
use crate::gateway::{CompletionGateway, CompletionSettings};
use crate::provider::{LlmProvider, OpenAiCompatProvider};
use crate::session::SessionStore;
use crate::types::Message;
use crate::util::{non_empty, truncate_string};

/// Request orchestration: session bookkeeping around one upstream call.
///
/// Two requests for the same user are not serialized. Both may snapshot the
/// history before either reply lands, and the replies may be appended in
/// either order. Requests for different users only share the store's brief
/// lock sections.
pub struct ChatService {
    store: Arc<SessionStore>,
    gateway: CompletionGateway,
    request_timeout: Duration,
}

impl ChatService {
    pub fn new(store: Arc<SessionStore>, gateway: CompletionGateway, request_timeout: Duration) -> Self {
        Self {
            store,
            gateway,
            request_timeout,
        }
    }

    /// Wire up the OpenAI-compatible provider and a fresh store from config.
    pub fn from_config(cfg: &Config) -> std::result::Result<Self, ConfigError> {
        cfg.validate()?;
        let provider = OpenAiCompatProvider::new(
            cfg.openai.api_key.clone(),
            Some(cfg.openai.api_base.clone()),
        )
        .map_err(|e| match e {
            ProviderError::NoApiKey => ConfigError::NoApiKey,
            other => ConfigError::Invalid(other.to_string()),
        })?;
        Ok(Self::with_provider(cfg, Arc::new(provider)))
    }

    /// Build from config around an already constructed provider.
    pub fn with_provider(cfg: &Config, provider: Arc<dyn LlmProvider>) -> Self {
        let gateway = CompletionGateway::new(provider, CompletionSettings::from(&cfg.chat));
        Self::new(Arc::new(SessionStore::new()), gateway, cfg.chat.request_timeout())
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn gateway(&self) -> &CompletionGateway {
        &self.gateway
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Send `message` as `user_id` and return the assistant's reply.
    pub async fn chat(&self, user_id: &str, message: &str) -> Result<String> {
        self.chat_with_cancel(user_id, message, CancellationToken::new()).await
    }

    /// Like [`ChatService::chat`], aborting the upstream call when `cancel`
    /// fires. The user's message stays in history on every failure; the
    /// assistant reply is only appended when the call completes.
    pub async fn chat_with_cancel(
        &self,
        user_id: &str,
        message: &str,
        cancel: CancellationToken,
    ) -> Result<String> {
        let user_id = validate_user_id(user_id)?;
        if non_empty(message).is_none() {
            return Err(ChatError::Validation("message must not be empty".to_string()));
        }

        info!("Chat request: user={}, message={}", user_id, truncate_string(message, 80, "..."));

        self.store.append_message(user_id, Message::user(message)).await;
        let history = self.store.get_history(user_id).await;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChatError::Cancelled),
            res = tokio::time::timeout(self.request_timeout, self.gateway.complete(&history)) => {
                res.unwrap_or(Err(ChatError::Timeout(self.request_timeout)))
            }
        };

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Chat request for user {} failed: {}", user_id, e);
                return Err(e);
            }
        };

        self.store
            .append_message(user_id, Message::assistant(reply.clone()))
            .await;
        Ok(reply)
    }

    /// The user's full history, oldest first.
    pub async fn history(&self, user_id: &str) -> Result<Vec<Message>> {
        let user_id = validate_user_id(user_id)?;
        Ok(self.store.get_history(user_id).await)
    }

    /// Forget the user's session. Succeeds whether or not one existed.
    pub async fn clear(&self, user_id: &str) -> Result<()> {
        let user_id = validate_user_id(user_id)?;
        if self.store.clear(user_id).await {
            info!("Cleared session for user {}", user_id);
        }
        Ok(())
    }
}

fn validate_user_id(user_id: &str) -> Result<&str> {
    non_empty(user_id).ok_or_else(|| ChatError::Validation("user_id must not be empty".to_string()))
}
