//! Error types for fleetrecap.
//!
//! The aggregation engine distinguishes errors it can degrade around
//! (malformed events, a failing diff formatter, a result that cannot be
//! rendered) from the one error it cannot survive: losing the output stream.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fleetrecap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for fleetrecap.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Event Stream Errors
    // ========================================================================
    /// An inbound event could not be understood.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// An event could not be decoded from JSON.
    #[error("malformed event: {0}")]
    EventDecode(#[from] serde_json::Error),

    /// A folded host pattern could not be expanded.
    #[error("Invalid host pattern: '{0}'")]
    InvalidHostPattern(String),

    // ========================================================================
    // Rendering Errors
    // ========================================================================
    /// Rendering a single host result failed.
    #[error("unable to render {outcome} result of task '{task}' for host '{host}': {message}")]
    Render {
        /// Task name
        task: String,
        /// Host (or host/item id)
        host: String,
        /// Outcome kind of the result
        outcome: String,
        /// Error message
        message: String,
    },

    /// The external diff formatter failed.
    #[error("diff formatter '{command}' failed: {message}")]
    Formatter {
        /// Formatter command line
        command: String,
        /// Error message
        message: String,
    },

    /// Writing to the output stream failed.
    #[error("output stream error: {0}")]
    Output(#[from] std::io::Error),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Error loading configuration.
    #[error("Failed to load config from '{path}': {message}")]
    ConfigLoad {
        /// Path to the configuration file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Invalid configuration value.
    #[error("Invalid value for '{key}': {message}")]
    InvalidConfigValue {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates a new malformed event error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEvent(message.into())
    }

    /// Creates a new render error.
    pub fn render(
        task: impl Into<String>,
        host: impl Into<String>,
        outcome: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Render {
            task: task.into(),
            host: host.into(),
            outcome: outcome.into(),
            message: message.into(),
        }
    }

    /// Creates a new formatter error.
    pub fn formatter(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Formatter {
            command: command.into(),
            message: message.into(),
        }
    }

    /// The error text without the variant prefix, for nesting in other
    /// messages.
    pub fn detail(&self) -> String {
        match self {
            Error::MalformedEvent(message) => message.clone(),
            Error::EventDecode(e) => e.to_string(),
            other => other.to_string(),
        }
    }

    /// Returns true if the run can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Output(_))
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Output(_) => 3,
            Error::ConfigLoad { .. } | Error::InvalidConfigValue { .. } => 5,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_carries_context() {
        let err = Error::render("write motd", "node3", "changed", "bad yaml");
        let text = err.to_string();
        assert!(text.contains("write motd"));
        assert!(text.contains("node3"));
        assert!(text.contains("changed"));
    }

    #[test]
    fn test_detail_drops_prefix() {
        let err = Error::malformed("missing host");
        assert_eq!(err.to_string(), "malformed event: missing host");
        assert_eq!(err.detail(), "missing host");
    }

    #[test]
    fn test_only_output_errors_are_fatal() {
        assert!(Error::malformed("missing host").is_recoverable());
        assert!(Error::formatter("diffr", "exit status 1").is_recoverable());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        assert!(!Error::from(io).is_recoverable());
    }
}
