//! Provider Registry
//!
//! Maps configured backend names to adapter factories, so adding a backend
//! means registering one more factory rather than touching the turn logic.

use std::collections::BTreeMap;
use std::sync::Arc;

use assist_core::{
    error::{AgentError, Result},
    provider::{LlmProvider, ProviderConfig},
};

use crate::http::{HttpTransport, ReqwestTransport};

/// Builds one adapter from configuration and a transport
pub type ProviderFactory =
    fn(&ProviderConfig, Arc<dyn HttpTransport>) -> Result<Arc<dyn LlmProvider>>;

#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Registry without any backend
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every backend compiled into this build
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        #[cfg(feature = "ollama")]
        registry.register("ollama", |config, transport| {
            Ok(Arc::new(crate::ollama::OllamaProvider::from_config(config, transport)))
        });

        #[cfg(feature = "openai")]
        registry.register("openai", |config, transport| {
            Ok(Arc::new(crate::openai::OpenAiProvider::from_config(config, transport)?))
        });

        #[cfg(feature = "anthropic")]
        registry.register("anthropic", |config, transport| {
            Ok(Arc::new(crate::anthropic::AnthropicProvider::from_config(config, transport)?))
        });

        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: ProviderFactory) {
        self.factories.insert(name.into().to_lowercase(), factory);
    }

    /// Registered backend names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the configured backend over a real HTTP client
    pub fn build(&self, config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        self.build_with(config, transport)
    }

    /// Build the configured backend over the given transport
    ///
    /// Unregistered names fail with [`AgentError::UnknownProvider`].
    pub fn build_with(
        &self,
        config: &ProviderConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Arc<dyn LlmProvider>> {
        let name = config.provider.to_lowercase();
        let factory = self.factories.get(&name).ok_or_else(|| {
            AgentError::UnknownProvider(format!(
                "'{}' (available: {})",
                config.provider,
                self.names().join(", ")
            ))
        })?;

        let provider = factory(config, transport)?;
        tracing::info!(provider = %name, model = %config.model, "LLM provider ready");
        Ok(provider)
    }
}
