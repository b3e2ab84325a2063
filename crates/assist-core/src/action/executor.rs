//! Action Execution

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ActionCommand;
use crate::device::DeviceController;
use crate::error::AgentError;
use crate::provider::DEFAULT_REQUEST_TIMEOUT;

/// Per-command execution status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionStatus {
    Executed,
    Failed { reason: String },
}

/// What happened to one command
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionReport {
    pub command: ActionCommand,
    #[serde(flatten)]
    pub status: ActionStatus,
}

impl ActionReport {
    pub const fn succeeded(&self) -> bool {
        matches!(self.status, ActionStatus::Executed)
    }

    /// Spoken confirmation line for this command
    pub fn confirmation(&self) -> String {
        match self.status {
            ActionStatus::Executed => format!("Executed: {}", self.command),
            ActionStatus::Failed { .. } => format!("Failed: {}", self.command),
        }
    }
}

/// Runs decoded commands against the device backend, one at a time
pub struct ActionExecutor {
    controller: Arc<dyn DeviceController>,
    timeout: Duration,
}

impl ActionExecutor {
    pub fn new(controller: Arc<dyn DeviceController>) -> Self {
        Self {
            controller,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute one command and wait for the backend to finish
    ///
    /// Never fails: backend errors and timeouts become a `Failed` report so
    /// the remaining commands of the reply still run.
    pub async fn execute(&self, command: &ActionCommand) -> ActionReport {
        let params = command.service_data();

        tracing::info!(
            action = %command.kind(),
            target = %command.target_id,
            params = %serde_json::Value::Object(params.clone()),
            "Executing device action"
        );

        let call = self.controller.invoke(
            &command.domain,
            &command.service,
            &command.target_id,
            params,
        );

        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(format!(
                "{} did not complete within {}s",
                command.kind(),
                self.timeout.as_secs_f32()
            ))),
        };

        let status = match result {
            Ok(()) => ActionStatus::Executed,
            Err(err) => {
                tracing::warn!(action = %command.kind(), target = %command.target_id, error = %err, "Device action failed");
                ActionStatus::Failed { reason: err.to_string() }
            }
        };

        ActionReport {
            command: command.clone(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::decode;
    use crate::device::MemoryHome;

    fn command(domain: &str, service: &str, target: &str) -> ActionCommand {
        decode(&format!(
            r#"{{"action":"call_service","domain":"{domain}","service":"{service}","target":{{"entity_id":"{target}"}}}}"#
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_execute_success() {
        let home = Arc::new(MemoryHome::demo());
        let executor = ActionExecutor::new(home.clone());

        let report = executor.execute(&command("switch", "turn_on", "switch.coffee_maker")).await;

        assert!(report.succeeded());
        assert_eq!(report.confirmation(), "Executed: switch.turn_on on switch.coffee_maker");
        assert_eq!(home.get("switch.coffee_maker").unwrap().state, "on");

        let call = &home.invocations()[0];
        assert_eq!(call.params["entity_id"], "switch.coffee_maker");
    }

    #[tokio::test]
    async fn test_execute_backend_failure_is_reported() {
        let executor = ActionExecutor::new(Arc::new(MemoryHome::demo()));

        let report = executor.execute(&command("light", "turn_on", "light.garage")).await;

        assert!(!report.succeeded());
        assert_eq!(report.confirmation(), "Failed: light.turn_on on light.garage");
        assert!(matches!(report.status, ActionStatus::Failed { ref reason } if reason.contains("not found")));
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let home = MemoryHome::demo().with_latency(Duration::from_secs(5));
        let executor = ActionExecutor::new(Arc::new(home)).with_timeout(Duration::from_millis(20));

        let report = executor.execute(&command("light", "turn_off", "light.living_room")).await;

        assert!(matches!(report.status, ActionStatus::Failed { ref reason } if reason.starts_with("Timed out")));
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = ActionReport {
            command: command("lock", "unlock", "lock.front_door"),
            status: ActionStatus::Failed { reason: "jammed".into() },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "jammed");
        assert_eq!(json["command"]["target_id"], "lock.front_door");
    }
}
