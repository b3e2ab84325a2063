//! # assist-core
//!
//! Conversation mediator between a smart-home host and an LLM backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Agent (turn)                            │
//! │  ┌──────────────┐  ┌──────────────┐  ┌─────────────────────────┐  │
//! │  │   Context    │  │ LlmProvider  │  │  Action extract/decode  │  │
//! │  │   Builder    │──│  (Strategy)  │──│  → ActionExecutor       │  │
//! │  └──────────────┘  └──────────────┘  └─────────────────────────┘  │
//! │          │                                       │                │
//! │    DeviceSource        ConversationStore   DeviceController       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Ollama, OpenAI and
//! Anthropic without changing the turn logic. Device access goes through
//! `DeviceSource` and `DeviceController` so the host can plug in its own
//! state machine and service registry.

pub mod action;
pub mod context;
pub mod device;
pub mod error;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod session;
pub mod turn;

pub use action::{ActionCommand, ActionReport, ActionStatus};
pub use context::{ContextBuilder, DeviceContextEntry};
pub use device::{DeviceController, DeviceSource, DeviceState, MemoryHome};
pub use error::{AgentError, ErrorCode, Result};
pub use message::{Message, Role};
pub use provider::{AgentOptions, GenerationOptions, LlmProvider, ProviderConfig};
pub use session::{ConversationId, ConversationStore};
pub use turn::{Agent, AgentBuilder, TurnResult};
