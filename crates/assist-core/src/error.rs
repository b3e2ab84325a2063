//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM backend returned a non-success status or an unreadable envelope
    #[error("Provider error: {0}")]
    Provider(String),

    /// Backend could not be reached at all
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider call or device action exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Structured command text in a model reply could not be decoded
    #[error("Action decode error: {0}")]
    ActionDecode(String),

    /// Device backend rejected the action or was unreachable
    #[error("Action execution error: {0}")]
    ActionExecution(String),

    /// Configuration names a backend with no adapter
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Stable code reported to the host alongside the error speech
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Provider(_) | Self::ProviderUnavailable(_) => ErrorCode::Provider,
            Self::Timeout(_) => ErrorCode::Timeout,
            _ => ErrorCode::Unknown,
        }
    }

    /// Spoken form of a turn-level failure
    pub fn spoken(&self) -> String {
        format!("Error: {self}")
    }
}

/// Error classification attached to an error response
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Provider,
    Timeout,
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_classification() {
        assert_eq!(AgentError::ProviderUnavailable("refused".into()).code(), ErrorCode::Provider);
        assert_eq!(AgentError::Timeout("60s".into()).code(), ErrorCode::Timeout);
        assert_eq!(AgentError::ActionDecode("bad json".into()).code(), ErrorCode::Unknown);
    }

    #[test]
    fn test_spoken_embeds_detail() {
        let err = AgentError::Provider("openai returned 401: invalid key".into());
        assert_eq!(err.spoken(), "Error: Provider error: openai returned 401: invalid key");
        assert_eq!(err.code(), ErrorCode::Provider);
    }
}
