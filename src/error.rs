//! 统一错误类型：请求校验、上游网关与编程契约错误。
//!
//! Crate-wide error type.
//!
//! Soft response-side failures (a malformed tool-call entry, an unrecognized
//! payload shape) are not errors: they are reported through
//! [`crate::tools::Diagnostic`] and never fail a request.

use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path that caused the error (e.g., "request.tool_choice", "upstream.stream_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected shape, actual value)
    pub details: Option<String>,
    /// Component that raised the error (e.g., "tool_injector", "config_loader")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the bridge.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied something the bridge cannot honor (4xx, never retried).
    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// Upstream answered with a non-success status.
    #[error("Upstream error: HTTP {status}")]
    Upstream {
        status: u16,
        body: Option<serde_json::Value>,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    /// A caller broke an adapter's input contract. This is a bug, not a runtime condition.
    #[error("Contract violation in {operation}: {message}")]
    ContractViolation {
        operation: &'static str,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn contract_violation(operation: &'static str, msg: impl Into<String>) -> Self {
        Error::ContractViolation {
            operation,
            message: msg.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The user-facing message, without the variant prefix or context suffix.
    pub fn message(&self) -> String {
        match self {
            Error::Validation { message, .. }
            | Error::Configuration { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_rendered_in_display() {
        let err = Error::validation_with_context(
            "Invalid tool_choice: 'sometimes'",
            ErrorContext::new()
                .with_field_path("request.tool_choice")
                .with_source("tool_injector"),
        );
        let text = err.to_string();
        assert!(text.starts_with("Validation error: Invalid tool_choice"));
        assert!(text.contains("field: request.tool_choice"));
        assert!(text.contains("source: tool_injector"));
        assert_eq!(err.message(), "Invalid tool_choice: 'sometimes'");
    }

    #[test]
    fn test_context_absent_for_upstream() {
        let err = Error::Upstream {
            status: 503,
            body: None,
        };
        assert!(err.context().is_none());
        assert_eq!(err.to_string(), "Upstream error: HTTP 503");
    }
}
