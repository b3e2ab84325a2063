//! Device Actions
//!
//! Structured commands embedded in model replies:
//!
//! ```text
//! {"action": "call_service", "domain": "light", "service": "turn_on",
//!  "target": {"entity_id": "light.living_room"}, "data": {"brightness_pct": 80}}
//! ```
//!
//! [`extract`] finds candidate payloads in raw reply text, [`decode`] turns
//! one candidate into an [`ActionCommand`], and [`ActionExecutor`] runs it
//! against the device backend.

mod executor;
mod extract;

pub use executor::{ActionExecutor, ActionReport, ActionStatus};
pub use extract::{extract, Candidate, ExtractStrategy, Extraction};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, Result};

/// Discriminator every action payload must carry
pub const CALL_SERVICE: &str = "call_service";

/// A decoded device directive, alive only for the turn that produced it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionCommand {
    pub domain: String,
    pub service: String,
    pub target_id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl ActionCommand {
    /// `domain.service`
    pub fn kind(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }

    /// Free-form data merged with the target's `entity_id`
    pub fn service_data(&self) -> Map<String, Value> {
        let mut params = self.data.clone();
        params.insert("entity_id".into(), Value::String(self.target_id.clone()));
        params
    }
}

impl std::fmt::Display for ActionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} on {}", self.domain, self.service, self.target_id)
    }
}

/// Result of decoding one extracted candidate
#[derive(Clone, Debug, PartialEq)]
pub enum ActionOutcome {
    Decoded(ActionCommand),
    DecodeFailed { candidate: String, reason: String },
}

/// Decode one candidate payload
///
/// Missing or empty `domain`, `service` or `target.entity_id`, a wrong
/// discriminator, or a non-object `data` are all decode failures.
pub fn decode(candidate: &str) -> Result<ActionCommand> {
    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| AgentError::ActionDecode(format!("invalid JSON: {e}")))?;

    let payload = value
        .as_object()
        .ok_or_else(|| AgentError::ActionDecode("payload is not a JSON object".into()))?;

    let action = required_str(payload, "action")?;
    if action != CALL_SERVICE {
        return Err(AgentError::ActionDecode(format!("unsupported action '{action}'")));
    }

    let target_id = payload
        .get("target")
        .and_then(|t| t.get("entity_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AgentError::ActionDecode("missing target.entity_id".into()))?;

    let data = match payload.get("data") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(AgentError::ActionDecode(format!("data must be an object, got {other}")));
        }
    };

    Ok(ActionCommand {
        domain: required_str(payload, "domain")?.to_string(),
        service: required_str(payload, "service")?.to_string(),
        target_id: target_id.to_string(),
        data,
    })
}

fn required_str<'a>(payload: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AgentError::ActionDecode(format!("missing field '{field}'")))
}

/// Decode every candidate of an extraction, in order
pub fn decode_all(extraction: &Extraction) -> Vec<ActionOutcome> {
    extraction
        .candidates()
        .iter()
        .map(|candidate| match decode(&candidate.body) {
            Ok(command) => ActionOutcome::Decoded(command),
            Err(err) => {
                tracing::debug!(error = %err, candidate = %candidate.body, "Skipping action candidate");
                ActionOutcome::DecodeFailed {
                    candidate: candidate.body.clone(),
                    reason: err.to_string(),
                }
            }
        })
        .collect()
}
