//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference over the
//! `/api/chat` endpoint.

use std::sync::Arc;

use assist_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{GenerationOptions, LlmProvider, ProviderConfig},
};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::http::{join_url, HttpRequest, HttpTransport};

pub const DEFAULT_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Ollama LLM provider
pub struct OllamaProvider {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// Create from configuration; no credential is needed
    pub fn from_config(config: &ProviderConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let model = if config.model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            config.model.clone()
        };

        Self {
            transport,
            base_url: config.api_url.clone().unwrap_or_else(|| DEFAULT_URL.into()),
            model,
        }
    }

    /// Create against a local Ollama with default settings
    pub fn localhost(transport: Arc<dyn HttpTransport>) -> Self {
        Self::from_config(&ProviderConfig::new("ollama"), transport)
    }

    /// Chat request body: system prompt as the leading message, no streaming
    fn build_body(&self, system_prompt: &str, history: &[Message], options: &GenerationOptions) -> Value {
        let messages: Vec<Value> = std::iter::once(Message::system(system_prompt))
            .chain(history.iter().cloned())
            .map(|m| m.to_wire())
            .collect();

        json!({
            "model": self.model_for(options),
            "messages": messages,
            "stream": false,
            "options": { "temperature": options.temperature },
        })
    }

    fn model_for<'a>(&'a self, options: &'a GenerationOptions) -> &'a str {
        if options.model.is_empty() { &self.model } else { &options.model }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool> {
        let request = HttpRequest::get(join_url(&self.base_url, "/api/tags"));
        match self.transport.send(request).await {
            Ok(response) => Ok(response.is_success()),
            Err(e) => {
                tracing::warn!(error = %e, "Ollama health check failed");
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
        tracing::debug!(model = self.model_for(options), messages = history.len(), "Sending Ollama chat request");

        let response = self
            .transport
            .send(HttpRequest::post(join_url(&self.base_url, "/api/chat"), body))
            .await?;

        let envelope = response.into_json(self.name())?;
        envelope["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::Provider("ollama response missing message.content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockTransport;
    use crate::http::Method;

    fn provider(transport: &Arc<MockTransport>) -> OllamaProvider {
        OllamaProvider::localhost(transport.clone())
    }

    #[tokio::test]
    async fn test_chat_wire_shape() {
        let transport = Arc::new(
            MockTransport::default().respond(200, r#"{"message": {"role": "assistant", "content": "Hello!"}}"#),
        );
        let ollama = provider(&transport);

        let history = vec![Message::user("Hi"), Message::assistant("Hey"), Message::user("Lights?")];
        let reply = ollama
            .complete("You are helpful.", &history, &GenerationOptions::new("", 0.3))
            .await
            .unwrap();
        assert_eq!(reply, "Hello!");

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::Post);
        assert_eq!(sent.url, "http://localhost:11434/api/chat");
        assert!(sent.headers.is_empty());

        let body = sent.body.as_ref().unwrap();
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["stream"], false);
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are helpful.");
        assert_eq!(body["messages"][3]["content"], "Lights?");
        assert_eq!(body["messages"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_configured_url_and_model() {
        let transport = Arc::new(MockTransport::default().respond(200, r#"{"message": {"content": "ok"}}"#));
        let config = ProviderConfig::new("ollama")
            .with_api_url("http://nas:11434/")
            .with_model("mistral");
        let ollama = OllamaProvider::from_config(&config, transport.clone());

        ollama.complete("sys", &[], &GenerationOptions::new("", 0.7)).await.unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "http://nas:11434/api/chat");
        assert_eq!(sent.body.as_ref().unwrap()["model"], "mistral");
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let transport = Arc::new(MockTransport::default().respond(404, "model 'llama9' not found"));
        let err = provider(&transport)
            .complete("sys", &[], &GenerationOptions::new("llama9", 0.7))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Provider error: ollama returned 404: model 'llama9' not found");
    }

    #[tokio::test]
    async fn test_missing_content_is_provider_error() {
        let transport = Arc::new(MockTransport::default().respond(200, r#"{"done": true}"#));
        let err = provider(&transport)
            .complete("sys", &[], &GenerationOptions::new("", 0.7))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let transport = Arc::new(
            MockTransport::default()
                .respond(200, r#"{"models": []}"#)
                .fail(AgentError::ProviderUnavailable("connection refused".into())),
        );
        let ollama = provider(&transport);

        assert!(ollama.health_check().await.unwrap());
        assert!(!ollama.health_check().await.unwrap());
        assert_eq!(transport.requests()[0].url, "http://localhost:11434/api/tags");
        assert_eq!(transport.requests()[0].method, Method::Get);
    }
}
