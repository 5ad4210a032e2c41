//! Request-side tool injection.
//!
//! [`ToolInjector::prepare`] decides how declared tools reach the upstream model
//! (a native tool block, or a `<tool_call>` prompt fragment) and
//! [`ToolInjector::apply`] writes that decision into the outbound request.

use serde_json::Value;
use tracing::{debug, Span};

use crate::config::ToolMode;
use crate::drivers::driver_for;
use crate::logging::log_tool_processing;
use crate::registry::ModelFamily;
use crate::tools::prompt::{format_tool_call_tag, render_tool_prompt};
use crate::types::message::{Message, MessageContent, MessageRole};
use crate::types::openai::ChatCompletionRequest;
use crate::types::tool::{Tool, ToolChoice};
use crate::types::upstream::UpstreamChatRequest;
use crate::{Error, ErrorContext, Result};

/// How tools are attached to the outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundAugmentation {
    /// No tools declared; the request goes out untouched.
    Passthrough,
    /// Family-shaped tool block sent as request fields.
    Native {
        tools: Value,
        tool_choice: Option<Value>,
    },
    /// Emulated tools. `fragment` is `None` when the caller forbade tool use,
    /// in which case only the history is rewritten.
    Prompt { fragment: Option<String> },
}

impl OutboundAugmentation {
    /// Family the response must be decoded as.
    pub fn effective_family(&self, family: ModelFamily) -> ModelFamily {
        match self {
            OutboundAugmentation::Prompt { .. } => ModelFamily::PromptBased,
            _ => family,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, OutboundAugmentation::Native { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ToolInjector {
    span: Span,
}

impl ToolInjector {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    pub fn current() -> Self {
        Self::new(Span::current())
    }

    /// Validate the request's `tools`/`tool_choice` and prepare them for `family`.
    pub fn prepare_request(
        &self,
        request: &ChatCompletionRequest,
        family: ModelFamily,
        mode: ToolMode,
    ) -> Result<OutboundAugmentation> {
        let choice = ToolChoice::from_optional(request.tool_choice.as_ref())?;
        let tools = match &request.tools {
            Some(defs) => Tool::from_definitions(defs)?,
            None => Vec::new(),
        };
        if tools.is_empty() {
            return Ok(OutboundAugmentation::Passthrough);
        }
        self.prepare(&tools, &choice, family, use_native(family, mode)?)
    }

    /// Shape `tools` for `family`: natively when `use_native` and the family
    /// supports it, as a prompt fragment otherwise.
    pub fn prepare(
        &self,
        tools: &[Tool],
        choice: &ToolChoice,
        family: ModelFamily,
        use_native: bool,
    ) -> Result<OutboundAugmentation> {
        let _guard = self.span.enter();
        if tools.is_empty() {
            return Ok(OutboundAugmentation::Passthrough);
        }

        let driver = driver_for(family);
        if use_native {
            if let Some(block) = driver.native_tools(tools) {
                log_tool_processing(family, tools.len(), true);
                return Ok(OutboundAugmentation::Native {
                    tools: block,
                    tool_choice: driver.native_tool_choice(choice),
                });
            }
        }

        log_tool_processing(family, tools.len(), false);
        let fragment = match choice {
            ToolChoice::None => None,
            _ => Some(render_tool_prompt(driver.prompt_template(), tools, choice)),
        };
        Ok(OutboundAugmentation::Prompt { fragment })
    }

    /// Write `augmentation` into `request`.
    pub fn apply(&self, augmentation: &OutboundAugmentation, request: &mut UpstreamChatRequest) {
        let _guard = self.span.enter();
        match augmentation {
            OutboundAugmentation::Passthrough => {}
            OutboundAugmentation::Native { tools, tool_choice } => {
                request.tools = Some(tools.clone());
                request.tool_choice = tool_choice.clone();
            }
            OutboundAugmentation::Prompt { fragment } => {
                if let Some(messages) = request.messages.as_mut() {
                    rewrite_history_for_prompt(messages);
                    if let Some(fragment) = fragment {
                        inject_system_fragment(messages, fragment);
                        debug!(fragment_len = fragment.len(), "Injected tool prompt");
                    }
                }
            }
        }
    }
}

/// Resolve the configured mode against the family.
pub fn use_native(family: ModelFamily, mode: ToolMode) -> Result<bool> {
    match mode {
        ToolMode::Prompt => Ok(false),
        ToolMode::Auto => Ok(family.supports_native_tools()),
        ToolMode::Native if family.supports_native_tools() => Ok(true),
        ToolMode::Native => Err(Error::validation_with_context(
            "Native tool calling is not available for this model",
            ErrorContext::new()
                .with_field_path("request.model")
                .with_details(format!("model family '{}' has no native tool support", family))
                .with_source("tool_injector"),
        )),
    }
}

/// Append to the first system message, or prepend one.
fn inject_system_fragment(messages: &mut Vec<Message>, fragment: &str) {
    match messages.iter_mut().find(|m| m.role == MessageRole::System) {
        Some(system) => {
            let existing = system.text();
            let joined = if existing.is_empty() {
                fragment.to_string()
            } else {
                format!("{}\n\n{}", existing, fragment)
            };
            system.content = Some(MessageContent::Text(joined));
        }
        None => messages.insert(0, Message::system(fragment)),
    }
}

/// Prompt-based models have no tool roles: replay assistant calls as
/// `<tool_call>` tags and tool results as user turns.
fn rewrite_history_for_prompt(messages: &mut [Message]) {
    for message in messages.iter_mut() {
        match message.role {
            MessageRole::Assistant => {
                let Some(calls) = message.tool_calls.take() else {
                    continue;
                };
                let mut text = message.text();
                for call in &calls {
                    let function = call.get("function");
                    let name = function
                        .and_then(|f| f.get("name"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let arguments = match function.and_then(|f| f.get("arguments")) {
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                        None => "{}".to_string(),
                    };
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&format_tool_call_tag(name, &arguments));
                }
                message.content = Some(MessageContent::Text(text));
            }
            MessageRole::Tool => {
                let id = message.tool_call_id.take().unwrap_or_default();
                let text = format!("Tool result ({}): {}", id, message.text());
                *message = Message::user(text);
            }
            _ => {}
        }
    }
}
