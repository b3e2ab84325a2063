//! OpenAI LLM Provider
//!
//! Chat Completions API (`/v1/chat/completions`) with bearer authentication.
//! Any server speaking the same protocol works through `ASSIST_API_URL`.

use std::sync::Arc;

use assist_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{ApiKey, GenerationOptions, LlmProvider, ProviderConfig},
};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::http::{join_url, HttpRequest, HttpTransport};

pub const DEFAULT_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiProvider {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    model: String,
    api_key: ApiKey,
}

impl OpenAiProvider {
    /// Create from configuration; fails without an API key
    pub fn from_config(config: &ProviderConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AgentError::Config("openai requires an API key (ASSIST_API_KEY)".into()))?;

        Ok(Self {
            transport,
            base_url: config.api_url.clone().unwrap_or_else(|| DEFAULT_URL.into()),
            model: if config.model.is_empty() { DEFAULT_MODEL.into() } else { config.model.clone() },
            api_key,
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose())
    }

    fn build_body(&self, system_prompt: &str, history: &[Message], options: &GenerationOptions) -> Value {
        let messages: Vec<Value> = std::iter::once(Message::system(system_prompt))
            .chain(history.iter().cloned())
            .map(|m| m.to_wire())
            .collect();

        let model = if options.model.is_empty() { &self.model } else { &options.model };

        json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<bool> {
        let request = HttpRequest::get(join_url(&self.base_url, "/v1/models"))
            .header("Authorization", self.bearer());
        match self.transport.send(request).await {
            Ok(response) => Ok(response.is_success()),
            Err(e) => {
                tracing::warn!(error = %e, "OpenAI health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        options: &GenerationOptions,
    ) -> Result<String> {
        let body = self.build_body(system_prompt, history, options);
        tracing::debug!(model = %body["model"], messages = history.len(), "Sending OpenAI chat request");

        let request = HttpRequest::post(join_url(&self.base_url, "/v1/chat/completions"), body)
            .header("Authorization", self.bearer());
        let envelope = self.transport.send(request).await?.into_json(self.name())?;

        envelope["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::Provider("openai response missing choices[0].message.content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockTransport;

    const REPLY: &str = r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "Done."}}]}"#;

    fn provider(transport: &Arc<MockTransport>) -> OpenAiProvider {
        let config = ProviderConfig::new("openai").with_api_key("sk-test-123");
        OpenAiProvider::from_config(&config, transport.clone()).unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        let transport = Arc::new(MockTransport::default());
        let result = OpenAiProvider::from_config(&ProviderConfig::new("openai"), transport);
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[tokio::test]
    async fn test_chat_wire_shape() {
        let transport = Arc::new(MockTransport::default().respond(200, REPLY));
        let openai = provider(&transport);

        let reply = openai
            .complete("sys", &[Message::user("Lights off")], &GenerationOptions::new("", 0.7))
            .await
            .unwrap();
        assert_eq!(reply, "Done.");

        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(sent.header_value("Authorization"), Some("Bearer sk-test-123"));

        let body = sent.body.as_ref().unwrap();
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert!(body["temperature"].is_number());
        assert!(body.get("options").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Lights off");
    }

    #[tokio::test]
    async fn test_error_does_not_leak_key() {
        let transport = Arc::new(MockTransport::default().respond(401, r#"{"error": "invalid_api_key"}"#));
        let err = provider(&transport)
            .complete("sys", &[], &GenerationOptions::new("gpt-4o", 0.7))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("openai returned 401"));
        assert!(!message.contains("sk-test-123"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_provider_error() {
        let transport = Arc::new(MockTransport::default().respond(200, r#"{"choices": []}"#));
        let err = provider(&transport)
            .complete("sys", &[], &GenerationOptions::new("", 0.7))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }

    #[tokio::test]
    async fn test_health_check_sends_bearer() {
        let transport = Arc::new(MockTransport::default().respond(401, "unauthorized"));
        let openai = provider(&transport);

        assert!(!openai.health_check().await.unwrap());
        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "https://api.openai.com/v1/models");
        assert_eq!(sent.header_value("authorization"), Some("Bearer sk-test-123"));
    }
}
