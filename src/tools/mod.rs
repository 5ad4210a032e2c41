//! 工具调用归一化：请求侧注入、响应侧拦截与输出适配
//!
//! Tool-calling normalization core.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`inject`] | Attach tools to an outbound request, natively or as a prompt |
//! | [`intercept`] | Recover tool calls and clean text from an upstream payload |
//! | [`adapters`] | Render universal calls in OpenAI client shapes |
//! | [`prompt`] | The `<tool_call>` text protocol: templates and tag scanner |

pub mod adapters;
pub mod inject;
pub mod intercept;
pub mod prompt;

use std::fmt;

use crate::types::tool::ToolCall;

pub use adapters::{
    stream_delta_from_value, to_chat_completion_tool_calls, to_response_function_calls,
    to_stream_delta,
};
pub use inject::{OutboundAugmentation, ToolInjector};
pub use intercept::ToolInterceptor;

/// Soft failure met while decoding a response. Never fails the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// One tool-call entry was malformed and dropped; the others survive.
    EntrySkipped { index: usize, reason: String },
    /// The payload matched no known shape; its raw text was returned instead.
    PayloadUnrecoverable { reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::EntrySkipped { index, reason } => {
                write!(f, "Failed to parse tool call at index {}: {}", index, reason)
            }
            Diagnostic::PayloadUnrecoverable { reason } => {
                write!(f, "Failed to interpret upstream payload: {}", reason)
            }
        }
    }
}

/// Interceptor result.
///
/// `tool_calls` is `None` when nothing survived; it is never an empty list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interception {
    pub tool_calls: Option<Vec<ToolCall>>,
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl Interception {
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.is_some()
    }

    pub fn calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}
