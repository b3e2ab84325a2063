//! # assist-runtime
//!
//! LLM backend adapters for the home assistant mediator.
//!
//! ## Providers
//!
//! - **Ollama** (default): local inference via `/api/chat`
//! - **OpenAI**: Chat Completions API
//! - **Anthropic**: Messages API
//!
//! ## Usage
//!
//! ```rust,ignore
//! use assist_runtime::ProviderRegistry;
//!
//! let provider = ProviderRegistry::with_defaults().build(&ProviderConfig::from_env()?)?;
//! let agent = Agent::builder()
//!     .provider(provider)
//!     .home(home)
//!     .build()?;
//! ```

pub mod http;
pub mod registry;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub mod anthropic;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicProvider;
#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;
#[cfg(feature = "openai")]
pub use openai::OpenAiProvider;

pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use registry::ProviderRegistry;

// Re-export core types for convenience
pub use assist_core::{
    Agent, AgentError, LlmProvider, Message, ProviderConfig, Result, Role, TurnResult,
};
