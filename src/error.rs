//! Error types for Foreman
//!
//! This module defines all error types used throughout the agent subsystem.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! Only three categories are allowed to fail an entire turn: configuration
//! errors (`Config`), persistence errors (`Store`), and cancellation
//! (`Aborted`). Errors local to a single tool call are captured in the
//! tool-call result stream and never surface as `Err` from the loop.

use thiserror::Error;

/// The primary error type for agent operations.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration errors (no usable AI setup, no feature enabled, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider errors (completion API failures, malformed responses, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool execution errors that escape the executor's fault isolation
    /// (should be rare; expected tool failures are folded into results)
    #[error("Tool error: {0}")]
    Tool(String),

    /// Persistence errors (message insert, task enqueue, metrics update)
    #[error("Store error: {0}")]
    Store(String),

    /// Resource not found (unknown task type, missing session, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The turn was cancelled via the cooperative cancellation signal
    #[error("{0}")]
    Aborted(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors from provider adapters
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Returns `true` if this error terminates the whole turn.
    ///
    /// Tool-local failures are never represented as `AgentError` inside the
    /// loop, so everything reaching the caller is turn-level by construction;
    /// this helper exists for callers that aggregate errors from several
    /// subsystem entry points.
    pub fn is_turn_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::Config(_) | AgentError::Store(_) | AgentError::Aborted(_)
        )
    }
}

/// A specialized `Result` type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::Config("no AI features enabled".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: no AI features enabled"
        );
    }

    #[test]
    fn test_aborted_display_is_bare() {
        let err = AgentError::Aborted("Request aborted".to_string());
        assert_eq!(err.to_string(), "Request aborted");
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AgentError = json_err.into();
        assert!(matches!(err, AgentError::Json(_)));
    }

    #[test]
    fn test_turn_fatal_classification() {
        assert!(AgentError::Config("x".into()).is_turn_fatal());
        assert!(AgentError::Store("x".into()).is_turn_fatal());
        assert!(AgentError::Aborted("x".into()).is_turn_fatal());
        assert!(!AgentError::Tool("x".into()).is_turn_fatal());
        assert!(!AgentError::Provider("x".into()).is_turn_fatal());
        assert!(!AgentError::NotFound("x".into()).is_turn_fatal());
    }

    #[test]
    fn test_result_type() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
