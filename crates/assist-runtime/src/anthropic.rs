//! Anthropic LLM Provider
//!
//! Messages API (`/v1/messages`). The system prompt travels as a top-level
//! field rather than a message, and `max_tokens` is mandatory.

use std::sync::Arc;

use assist_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{ApiKey, GenerationOptions, LlmProvider, ProviderConfig},
};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::http::{join_url, HttpRequest, HttpTransport};

pub const DEFAULT_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
pub const API_VERSION: &str = "2023-06-01";

const KEY_PREFIX: &str = "sk-ant-";

pub struct AnthropicProvider {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    model: String,
    api_key: ApiKey,
}

impl AnthropicProvider {
    /// Create from configuration; fails without an API key
    pub fn from_config(config: &ProviderConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AgentError::Config("anthropic requires an API key (ASSIST_API_KEY)".into()))?;

        Ok(Self {
            transport,
            base_url: config.api_url.clone().unwrap_or_else(|| DEFAULT_URL.into()),
            model: if config.model.is_empty() { DEFAULT_MODEL.into() } else { config.model.clone() },
            api_key,
        })
    }

    // Temperature is not forwarded to this backend.
    fn build_body(&self, system_prompt: &str, history: &[Message], options: &GenerationOptions) -> Value {
        let messages: Vec<Value> = history.iter().map(Message::to_wire).collect();
        let model = if options.model.is_empty() { &self.model } else { &options.model };

        json!({
            "model": model,
            "max_tokens": options.max_tokens,
            "system": system_prompt,
            "messages": messages,
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    /// Key format check only; no request is made
    async fn health_check(&self) -> Result<bool> {
        Ok(self.api_key.expose().starts_with(KEY_PREFIX))
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        options: &GenerationOptions,
    ) -> Result<String> {
        let body = self.build_body(system_prompt, history, options);
        tracing::debug!(model = %body["model"], messages = history.len(), "Sending Anthropic messages request");

        let request = HttpRequest::post(join_url(&self.base_url, "/v1/messages"), body)
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", API_VERSION);
        let envelope = self.transport.send(request).await?.into_json(self.name())?;

        envelope["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::Provider("anthropic response missing content[0].text".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockTransport;

    const REPLY: &str = r#"{"id": "msg_1", "type": "message", "role": "assistant", "content": [{"type": "text", "text": "The door is locked."}]}"#;

    fn provider(transport: &Arc<MockTransport>, key: &str) -> AnthropicProvider {
        let config = ProviderConfig::new("anthropic").with_api_key(key);
        AnthropicProvider::from_config(&config, transport.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_messages_wire_shape() {
        let transport = Arc::new(MockTransport::default().respond(200, REPLY));
        let anthropic = provider(&transport, "sk-ant-abc");

        let history = vec![Message::user("Is the door locked?")];
        let reply = anthropic
            .complete("You are a smart home assistant.", &history, &GenerationOptions::new("", 0.9))
            .await
            .unwrap();
        assert_eq!(reply, "The door is locked.");

        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(sent.header_value("x-api-key"), Some("sk-ant-abc"));
        assert_eq!(sent.header_value("anthropic-version"), Some(API_VERSION));

        let body = sent.body.as_ref().unwrap();
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["system"], "You are a smart home assistant.");
        assert!(body.get("temperature").is_none());
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_overloaded_status() {
        let transport = Arc::new(MockTransport::default().respond(529, "overloaded"));
        let err = provider(&transport, "sk-ant-abc")
            .complete("sys", &[], &GenerationOptions::new("", 0.7))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Provider error: anthropic returned 529: overloaded");
    }

    #[tokio::test]
    async fn test_transport_timeout_passes_through() {
        let transport = Arc::new(MockTransport::default().fail(AgentError::Timeout("request timed out".into())));
        let err = provider(&transport, "sk-ant-abc")
            .complete("sys", &[], &GenerationOptions::new("", 0.7))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_health_check_is_key_format_only() {
        let transport = Arc::new(MockTransport::default());

        assert!(provider(&transport, "sk-ant-abc").health_check().await.unwrap());
        assert!(!provider(&transport, "sk-abc").health_check().await.unwrap());
        assert!(transport.requests().is_empty());
    }
}
