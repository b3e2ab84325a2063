//! Turn Orchestration
//!
//! One user utterance in, one spoken reply out:
//!
//! ```text
//! Idle → ContextBuilt → ProviderCalled → ActionsExtracted → ActionsExecuted
//!      → ResponseAssembled → HistoryUpdated → Done
//! ```
//!
//! Any provider failure short-circuits to `ErrorResponse`, which leaves the
//! conversation history untouched. There are no automatic retries.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::action::{self, ActionExecutor, ActionOutcome, ActionReport, Extraction};
use crate::context::{ContextBuilder, DeviceContextEntry, MAX_ENTITIES_CONTEXT};
use crate::device::{DeviceController, DeviceSource};
use crate::error::{AgentError, ErrorCode, Result};
use crate::message::Message;
use crate::prompt;
use crate::provider::{AgentOptions, GenerationOptions, LlmProvider, DEFAULT_REQUEST_TIMEOUT};
use crate::session::{ConversationId, ConversationSession, ConversationStore};

/// Separator between confirmations when the reply carried no other text
pub const CONFIRMATION_SEPARATOR: &str = " | ";

/// Progress of a single turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    ContextBuilt,
    ProviderCalled,
    ActionsExtracted,
    ActionsExecuted,
    ResponseAssembled,
    HistoryUpdated,
    Done,
    ErrorResponse,
}

/// What the host gets back for one utterance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnResult {
    pub conversation_id: String,
    pub speech: String,
    #[serde(default)]
    pub actions: Vec<ActionReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

impl TurnResult {
    fn failed(id: &ConversationId, err: &AgentError) -> Self {
        Self {
            conversation_id: id.to_string(),
            speech: err.spoken(),
            actions: Vec::new(),
            error: Some(err.code()),
        }
    }

    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The conversation agent
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    context: ContextBuilder,
    executor: ActionExecutor,
    sessions: Arc<ConversationStore>,
    model: String,
    options: RwLock<AgentOptions>,
    timeout: Duration,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    pub fn sessions(&self) -> &Arc<ConversationStore> {
        &self.sessions
    }

    pub fn options(&self) -> AgentOptions {
        *self.options.read()
    }

    /// Replace the tunables; takes effect from the next turn
    pub fn update_options(&self, options: AgentOptions) -> Result<()> {
        options.validate()?;
        *self.options.write() = options;
        tracing::info!(
            temperature = options.temperature,
            max_history = options.max_history,
            "Agent options updated"
        );
        Ok(())
    }

    /// Current device snapshot, as the model would see it
    pub async fn devices(&self) -> Result<Vec<DeviceContextEntry>> {
        self.context.build().await
    }

    /// Process one utterance
    ///
    /// Never fails: provider errors come back as a [`TurnResult`] with
    /// `error` set and the conversation ID still populated.
    pub async fn process_turn(
        &self,
        text: &str,
        conversation_id: Option<String>,
        language: &str,
    ) -> TurnResult {
        let id = ConversationId::resolve(conversation_id.as_deref());
        let mut session = self.sessions.lock(&id).await;
        let options = self.options();

        trace_state(&id, TurnState::Idle);

        match self.run_turn(&mut session, text, language, options).await {
            Ok(result) => {
                trace_state(&id, TurnState::Done);
                result
            }
            Err(err) => {
                tracing::error!(conversation_id = %id, error = %err, "Error processing conversation");
                trace_state(&id, TurnState::ErrorResponse);
                self.sessions.release(session);
                TurnResult::failed(&id, &err)
            }
        }
    }

    async fn run_turn(
        &self,
        session: &mut ConversationSession,
        text: &str,
        language: &str,
        options: AgentOptions,
    ) -> Result<TurnResult> {
        let id = session.id.clone();

        let devices = self.context.build().await?;
        let system_prompt = prompt::system_prompt(&devices, language)?;
        trace_state(&id, TurnState::ContextBuilt);

        let user = Message::user(text);
        let mut history = session.messages().to_vec();
        history.push(user.clone());

        let generation = GenerationOptions::new(&self.model, options.temperature);
        let reply = self.call_provider(&system_prompt, &history, &generation).await?;
        trace_state(&id, TurnState::ProviderCalled);

        let extraction = action::extract(&reply);
        let outcomes = action::decode_all(&extraction);
        trace_state(&id, TurnState::ActionsExtracted);

        let mut actions = Vec::new();
        for outcome in outcomes {
            if let ActionOutcome::Decoded(command) = outcome {
                actions.push(self.executor.execute(&command).await);
            }
        }
        trace_state(&id, TurnState::ActionsExecuted);

        let speech = assemble_speech(&reply, &extraction, &actions);
        trace_state(&id, TurnState::ResponseAssembled);

        session.record_exchange(user, Message::assistant(reply), options.max_history);
        trace_state(&id, TurnState::HistoryUpdated);

        Ok(TurnResult {
            conversation_id: id.to_string(),
            speech,
            actions,
            error: None,
        })
    }

    async fn call_provider(
        &self,
        system_prompt: &str,
        history: &[Message],
        generation: &GenerationOptions,
    ) -> Result<String> {
        tracing::debug!(
            provider = self.provider.name(),
            model = %generation.model,
            messages = history.len(),
            "Calling provider"
        );

        let call = self.provider.complete(system_prompt, history, generation);
        tokio::time::timeout(self.timeout, call).await.map_err(|_| {
            AgentError::Timeout(format!(
                "{} did not respond within {}s",
                self.provider.name(),
                self.timeout.as_secs_f32()
            ))
        })?
    }
}

fn trace_state(id: &ConversationId, state: TurnState) {
    tracing::debug!(conversation_id = %id, state = ?state, "Turn state");
}

/// Build the spoken reply from the raw model text and what was executed
fn assemble_speech(reply: &str, extraction: &Extraction, actions: &[ActionReport]) -> String {
    if actions.is_empty() {
        return extraction.unfence(reply);
    }

    let remainder = extraction.strip(reply);
    if remainder.is_empty() {
        return actions
            .iter()
            .map(ActionReport::confirmation)
            .collect::<Vec<_>>()
            .join(CONFIRMATION_SEPARATOR);
    }

    let failures: Vec<String> = actions
        .iter()
        .filter(|report| !report.succeeded())
        .map(ActionReport::confirmation)
        .collect();

    if failures.is_empty() {
        remainder
    } else {
        format!("{remainder}\n{}", failures.join("\n"))
    }
}

/// Builder for [`Agent`]
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    source: Option<Arc<dyn DeviceSource>>,
    controller: Option<Arc<dyn DeviceController>>,
    sessions: Option<Arc<ConversationStore>>,
    model: String,
    options: AgentOptions,
    timeout: Duration,
    max_entities: usize,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            source: None,
            controller: None,
            sessions: None,
            model: String::new(),
            options: AgentOptions::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_entities: MAX_ENTITIES_CONTEXT,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use one backend for both the device snapshot and action execution
    pub fn home<H>(mut self, home: Arc<H>) -> Self
    where
        H: DeviceSource + DeviceController + 'static,
    {
        self.source = Some(home.clone());
        self.controller = Some(home);
        self
    }

    pub fn device_source(mut self, source: Arc<dyn DeviceSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn device_controller(mut self, controller: Arc<dyn DeviceController>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn sessions(mut self, sessions: Arc<ConversationStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    /// Deadline for each provider call and each device action
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_entities(mut self, max: usize) -> Self {
        self.max_entities = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        let source = self
            .source
            .ok_or_else(|| AgentError::Config("Device source is required".into()))?;
        let controller = self
            .controller
            .ok_or_else(|| AgentError::Config("Device controller is required".into()))?;

        self.options.validate()?;

        Ok(Agent {
            provider,
            context: ContextBuilder::new(source).with_max_entities(self.max_entities),
            executor: ActionExecutor::new(controller).with_timeout(self.timeout),
            sessions: self.sessions.unwrap_or_default(),
            model: self.model,
            options: RwLock::new(self.options),
            timeout: self.timeout,
        })
    }
}
