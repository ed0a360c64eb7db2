//! Error types for the ferrule domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for ferrule operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures raised by an LLM endpoint.
///
/// The streaming decoder sorts these into retryable and terminal classes;
/// see `ferrule_providers::retry::classify`.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("{message}")]
    RateLimited {
        message: String,
        /// Provider-declared reset instant, epoch milliseconds.
        reset_at_ms: Option<u64>,
    },

    #[error("{0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Failures raised from inside a tool's `execute`.
///
/// These never reach the agent loop: the registry converts them into a
/// failed `ToolResult`.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::Api {
            status_code: 500,
            message: "upstream exploded".into(),
        });
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("upstream exploded"));
    }

    #[test]
    fn rate_limited_displays_provider_message() {
        let err = ProviderError::RateLimited {
            message: "slow down".into(),
            reset_at_ms: Some(1_700_000_000_000),
        };
        assert_eq!(err.to_string(), "slow down");
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::PermissionDenied {
            tool_name: "shell".into(),
            reason: "command not allowed".into(),
        });
        assert!(err.to_string().contains("shell"));
        assert!(err.to_string().contains("not allowed"));
    }

    #[test]
    fn io_error_converts_into_tool_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.txt");
        let err: ToolError = io.into();
        assert!(matches!(err, ToolError::Io(_)));
        assert!(err.to_string().contains("missing.txt"));
    }
}
