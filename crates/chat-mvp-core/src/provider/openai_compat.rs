use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DEFAULT_API_BASE;
use crate::error::ProviderError;
use crate::types::{Choice, CompletionResponse, FinishReason, Message, Role, TokenUsage};
use crate::util::http;

use super::LlmProvider;

/// OpenAI-compatible provider.
/// Works with the OpenAI API and any server exposing `/chat/completions`.
pub struct OpenAiCompatProvider {
    api_key: String,
    api_base: String,
}

impl OpenAiCompatProvider {
    pub fn new(api_key: String, api_base: Option<String>) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::NoApiKey);
        }
        let base = api_base
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            api_key,
            api_base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireReply,
    finish_reason: Option<FinishReason>,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    #[serde(default = "assistant_role")]
    role: Role,
    content: Option<String>,
}

fn assistant_role() -> Role {
    Role::Assistant
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.api_base);

        let body = ChatCompletionRequest {
            model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            max_tokens,
            temperature,
        };

        debug!("OpenAI-compat request to {} with model {} ({} messages)", url, model, messages.len());

        let response = http::client()
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let text = response.text().await?;
        parse_openai_response(&text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Parse an OpenAI-format response body into our CompletionResponse.
pub fn parse_openai_response(body: &str) -> Result<CompletionResponse, ProviderError> {
    let data: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let choices = data
        .choices
        .into_iter()
        .map(|c| Choice {
            role: c.message.role,
            content: c.message.content.unwrap_or_default(),
            finish_reason: c.finish_reason,
        })
        .collect();

    let usage = data
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    Ok(CompletionResponse { choices, usage })
}
