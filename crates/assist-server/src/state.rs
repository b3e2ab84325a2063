//! Application State

use std::sync::Arc;

use assist_core::Agent;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Conversation agent (provider, device backend and sessions)
    pub agent: Arc<Agent>,
}

impl AppState {
    pub fn new(agent: Agent) -> Self {
        Self {
            agent: Arc::new(agent),
        }
    }
}
