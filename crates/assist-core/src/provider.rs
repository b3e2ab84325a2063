//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all LLM backends (Ollama, OpenAI,
//! Anthropic) so the turn orchestrator never branches on backend name.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use assist_core::provider::{GenerationOptions, LlmProvider};
//!
//! let reply = provider.complete(&system_prompt, &history, &options).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::message::Message;

/// Fixed request timeout for provider calls and device actions
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// Per-call generation settings, snapshotted at the start of a turn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "llama3.2", "gpt-4o-mini", "claude-3-haiku-20240307")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 2.0 = most random)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate, for backends that require it
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

const fn default_temperature() -> f32 { DEFAULT_TEMPERATURE }
const fn default_max_tokens() -> u32 { 1024 }

impl GenerationOptions {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens: default_max_tokens(),
        }
    }
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for a new backend, then register a
/// factory for it in the runtime's provider registry.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend name as used in configuration ("ollama", "openai", ...)
    fn name(&self) -> &str;

    /// Check that the backend is reachable and the credentials look valid
    async fn health_check(&self) -> Result<bool>;

    /// Send the system prompt plus history and return the reply text verbatim
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        options: &GenerationOptions,
    ) -> Result<String>;
}

/// API credential. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw secret, only for building request headers
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Immutable per-agent backend selection
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
    /// Backend name, resolved through the provider registry
    pub provider: String,

    /// Model name; adapters fall back to their own default when empty
    #[serde(default)]
    pub model: String,

    /// Endpoint base URL override
    #[serde(default)]
    pub api_url: Option<String>,

    /// Credential for cloud backends
    #[serde(default)]
    pub api_key: Option<ApiKey>,

    /// Request timeout for every provider call and device action
    #[serde(default = "default_timeout")]
    pub request_timeout: Duration,
}

const fn default_timeout() -> Duration { DEFAULT_REQUEST_TIMEOUT }

impl ProviderConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: String::new(),
            api_url: None,
            api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(ApiKey::new(key));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    ///
    /// Keys: `ASSIST_PROVIDER` (default "ollama"), `ASSIST_MODEL`,
    /// `ASSIST_API_URL`, `ASSIST_API_KEY`, `ASSIST_TIMEOUT_SECS`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let provider = lookup("ASSIST_PROVIDER")
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "ollama".into());

        let request_timeout = match lookup("ASSIST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    AgentError::Config(format!("ASSIST_TIMEOUT_SECS must be an integer, got '{raw}'"))
                })?;
                if secs == 0 {
                    return Err(AgentError::Config("ASSIST_TIMEOUT_SECS must be positive".into()));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            provider,
            model: lookup("ASSIST_MODEL").unwrap_or_default(),
            api_url: lookup("ASSIST_API_URL").filter(|u| !u.is_empty()),
            api_key: lookup("ASSIST_API_KEY").filter(|k| !k.is_empty()).map(ApiKey::new),
            request_timeout,
        })
    }
}

/// Tunables that may change between turns (never during one)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentOptions {
    pub temperature: f32,
    pub max_history: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

impl AgentOptions {
    /// Temperature must be within 0.0–2.0, history within 1–50 turns
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AgentError::Config(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if !(1..=50).contains(&self.max_history) {
            return Err(AgentError::Config(format!(
                "max_history must be between 1 and 50, got {}",
                self.max_history
            )));
        }
        Ok(())
    }

    /// Read `ASSIST_TEMPERATURE` and `ASSIST_MAX_HISTORY`, falling back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Self::default();

        if let Some(raw) = lookup("ASSIST_TEMPERATURE") {
            options.temperature = raw.trim().parse().map_err(|_| {
                AgentError::Config(format!("ASSIST_TEMPERATURE must be a number, got '{raw}'"))
            })?;
        }
        if let Some(raw) = lookup("ASSIST_MAX_HISTORY") {
            options.max_history = raw.trim().parse().map_err(|_| {
                AgentError::Config(format!("ASSIST_MAX_HISTORY must be an integer, got '{raw}'"))
            })?;
        }

        options.validate()?;
        Ok(options)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::new("llama3.2", DEFAULT_TEMPERATURE);
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(opts.max_tokens, 1024);
    }

    #[test]
    fn test_config_from_lookup_defaults() {
        let config = ProviderConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.provider, "ollama");
        assert!(config.api_key.is_none());
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_config_from_lookup_values() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("ASSIST_PROVIDER", " OpenAI "),
            ("ASSIST_MODEL", "gpt-4o-mini"),
            ("ASSIST_API_KEY", "sk-test"),
            ("ASSIST_TIMEOUT_SECS", "15"),
        ]))
        .unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_key.as_ref().map(ApiKey::expose), Some("sk-test"));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_config_rejects_bad_timeout() {
        let err = ProviderConfig::from_lookup(lookup(&[("ASSIST_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ProviderConfig::new("anthropic").with_api_key("sk-ant-secret");
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-ant-secret"));
        assert!(printed.contains("ApiKey(***)"));
    }

    #[test]
    fn test_options_validation() {
        assert!(AgentOptions::default().validate().is_ok());
        assert!(AgentOptions { temperature: 2.5, max_history: 10 }.validate().is_err());
        assert!(AgentOptions { temperature: 0.2, max_history: 0 }.validate().is_err());
        assert!(AgentOptions { temperature: 0.2, max_history: 51 }.validate().is_err());
    }

    #[test]
    fn test_options_from_lookup() {
        let options = AgentOptions::from_lookup(lookup(&[
            ("ASSIST_TEMPERATURE", "0.3"),
            ("ASSIST_MAX_HISTORY", "4"),
        ]))
        .unwrap();
        assert!((options.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(options.max_history, 4);
    }
}
