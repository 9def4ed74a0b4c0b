use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Number of most recent history messages forwarded upstream.
pub const HISTORY_WINDOW: usize = 20;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a friendly and helpful AI assistant. Answer clearly and concisely.";

/// Root configuration for chat-mvp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub chat: ChatConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Check the settings the service cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.openai.api_key.trim().is_empty() {
            return Err(ConfigError::NoApiKey);
        }
        if self.chat.history_window == 0 {
            return Err(ConfigError::Invalid("historyWindow must be at least 1".into()));
        }
        if self.chat.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("requestTimeoutSecs must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} is outside 0.0..=2.0",
                self.chat.temperature
            )));
        }
        Ok(())
    }

    /// Copy of the config that is safe to print.
    pub fn redacted(&self) -> Config {
        let mut cfg = self.clone();
        if !cfg.openai.api_key.is_empty() {
            cfg.openai.api_key = "********".to_string();
        }
        cfg
    }

    /// Address to bind the HTTP server to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_base: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// Deployment-wide completion settings. None of these vary per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub history_window: usize,
    pub request_timeout_secs: u64,
    pub system_prompt: String,
}

impl ChatConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            history_window: HISTORY_WINDOW,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: "static".to_string(),
        }
    }
}

// ====== Config loading ======

/// Load configuration from environment variables.
///
/// Priority:
/// 1. `CHAT_MVP_CONFIG` env var — full JSON config
/// 2. Defaults with individual env vars overlaid
pub fn load_config_from_env() -> Config {
    load_config_with(|key| std::env::var(key).ok())
}

/// Same as [`load_config_from_env`] but reads variables through `lookup`.
pub fn load_config_with<F>(lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(json) = lookup("CHAT_MVP_CONFIG") {
        match load_config_json(&json) {
            Ok(config) => return config,
            Err(e) => {
                tracing::warn!("Ignoring CHAT_MVP_CONFIG: {}", e);
            }
        }
    }

    let mut cfg = Config::default();

    // Upstream
    if let Some(v) = lookup("OPENAI_API_KEY") {
        cfg.openai.api_key = v;
    }
    if let Some(v) = lookup("OPENAI_API_BASE").filter(|v| !v.is_empty()) {
        cfg.openai.api_base = v;
    }

    // Completion settings
    if let Some(v) = lookup("CHAT_MODEL").filter(|v| !v.is_empty()) {
        cfg.chat.model = v;
    }
    if let Some(v) = parse_var(&lookup, "CHAT_MAX_TOKENS") {
        cfg.chat.max_tokens = v;
    }
    if let Some(v) = parse_var(&lookup, "CHAT_TEMPERATURE") {
        cfg.chat.temperature = v;
    }
    if let Some(v) = parse_var(&lookup, "CHAT_HISTORY_WINDOW") {
        cfg.chat.history_window = v;
    }
    if let Some(v) = parse_var(&lookup, "CHAT_REQUEST_TIMEOUT_SECS") {
        cfg.chat.request_timeout_secs = v;
    }
    if let Some(v) = lookup("CHAT_SYSTEM_PROMPT").filter(|v| !v.is_empty()) {
        cfg.chat.system_prompt = v;
    }

    // Server
    if let Some(v) = lookup("HOST").filter(|v| !v.is_empty()) {
        cfg.server.host = v;
    }
    if let Some(v) = parse_var(&lookup, "PORT") {
        cfg.server.port = v;
    }
    if let Some(v) = lookup("STATIC_DIR").filter(|v| !v.is_empty()) {
        cfg.server.static_dir = v;
    }

    cfg
}

/// Parse a full JSON config; missing fields take their defaults.
pub fn load_config_json(json: &str) -> Result<Config, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = load_config_with(env(&[]));
        assert_eq!(cfg.openai.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.chat.model, "gpt-3.5-turbo");
        assert_eq!(cfg.chat.max_tokens, 1000);
        assert_eq!(cfg.chat.temperature, 0.7);
        assert_eq!(cfg.chat.history_window, 20);
        assert_eq!(cfg.chat.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_env_overlay() {
        let cfg = load_config_with(env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("CHAT_MODEL", "gpt-4o-mini"),
            ("CHAT_HISTORY_WINDOW", "8"),
            ("CHAT_TEMPERATURE", "0.2"),
            ("PORT", "3000"),
        ]));
        assert_eq!(cfg.openai.api_key, "sk-test");
        assert_eq!(cfg.chat.model, "gpt-4o-mini");
        assert_eq!(cfg.chat.history_window, 8);
        assert_eq!(cfg.chat.temperature, 0.2);
        assert_eq!(cfg.server.port, 3000);
    }

    #[test]
    fn test_bad_numbers_are_ignored() {
        let cfg = load_config_with(env(&[("PORT", "eighty"), ("CHAT_MAX_TOKENS", "-1")]));
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.chat.max_tokens, 1000);
    }

    #[test]
    fn test_full_json_config() {
        let json = r#"{"openai":{"apiKey":"sk-json"},"chat":{"historyWindow":5}}"#;
        let cfg = load_config_with(env(&[("CHAT_MVP_CONFIG", json), ("OPENAI_API_KEY", "ignored")]));
        assert_eq!(cfg.openai.api_key, "sk-json");
        assert_eq!(cfg.chat.history_window, 5);
        assert_eq!(cfg.chat.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_invalid_json_falls_back_to_env() {
        let cfg = load_config_with(env(&[("CHAT_MVP_CONFIG", "{not json"), ("OPENAI_API_KEY", "sk-env")]));
        assert_eq!(cfg.openai.api_key, "sk-env");
    }

    #[test]
    fn test_load_config_json() {
        let cfg = load_config_json(r#"{"server":{"port":9000}}"#).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "0.0.0.0");

        let err = load_config_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("Failed to parse config"));
    }

    #[test]
    fn test_validate() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.validate(), Err(ConfigError::NoApiKey)));

        cfg.openai.api_key = "sk-test".into();
        assert!(cfg.validate().is_ok());

        cfg.chat.history_window = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        cfg.chat.history_window = 20;

        cfg.chat.temperature = 3.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_redacted() {
        let mut cfg = Config::default();
        cfg.openai.api_key = "sk-secret".into();
        let shown = serde_json::to_string(&cfg.redacted()).unwrap();
        assert!(!shown.contains("sk-secret"));
        assert_eq!(cfg.openai.api_key, "sk-secret");
    }
}
