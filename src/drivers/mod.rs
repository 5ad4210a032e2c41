//! 模型族驱动：每个响应格式族一个驱动，负责原生工具块的构造与响应解码
//!
//! Model-family drivers. One driver per [`ModelFamily`] owns everything
//! vendor-shaped about tool calling:
//! - reshaping universal [`Tool`]s and [`ToolChoice`] into the native tool block,
//! - the prompt template used when tools are emulated,
//! - decoding an object-shaped upstream payload into universal [`ToolCall`]s.
//!
//! Raw vendor shapes never leave this module; callers only see [`Extraction`].

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod prompt;

use serde_json::{Map, Value};

use crate::registry::ModelFamily;
use crate::tools::prompt::PromptTemplate;
use crate::tools::Diagnostic;
use crate::types::tool::{Tool, ToolCall, ToolChoice};

pub use anthropic::AnthropicDriver;
pub use google::GoogleDriver;
pub use openai::OpenAiDriver;
pub use prompt::PromptDriver;

/// Per-family tool-calling adaptation.
///
/// Implementations are stateless and shared process-wide.
pub trait FamilyDriver: Send + Sync + std::fmt::Debug {
    fn family(&self) -> ModelFamily;

    /// Native tool block for the outbound request, or `None` when the family
    /// has no native tool calling.
    fn native_tools(&self, tools: &[Tool]) -> Option<Value>;

    /// Native `tool_choice` for the outbound request.
    fn native_tool_choice(&self, choice: &ToolChoice) -> Option<Value>;

    /// Template for the emulated `<tool_call>` protocol.
    fn prompt_template(&self) -> &'static PromptTemplate;

    /// Decode an object payload (`{content, tool_calls}`).
    fn extract(&self, payload: &Map<String, Value>) -> Extraction;
}

static OPENAI: OpenAiDriver = OpenAiDriver;
static ANTHROPIC: AnthropicDriver = AnthropicDriver;
static GOOGLE: GoogleDriver = GoogleDriver;
static PROMPT: PromptDriver = PromptDriver;

/// Driver for a resolved family.
pub fn driver_for(family: ModelFamily) -> &'static dyn FamilyDriver {
    match family {
        ModelFamily::OpenAi => &OPENAI,
        ModelFamily::Anthropic => &ANTHROPIC,
        ModelFamily::Google => &GOOGLE,
        ModelFamily::PromptBased => &PROMPT,
    }
}

/// Decoded payload: clean text, surviving calls (in order) and skipped-entry notes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub text: String,
    pub calls: Vec<ToolCall>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Extraction {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub(crate) fn skip(&mut self, index: usize, reason: impl Into<String>) {
        self.diagnostics.push(Diagnostic::EntrySkipped {
            index,
            reason: reason.into(),
        });
    }

    pub(crate) fn merge(&mut self, other: Extraction) {
        self.text.push_str(&other.text);
        self.calls.extend(other.calls);
        self.diagnostics.extend(other.diagnostics);
    }
}

/// Text view of a `content` field.
///
/// Absent or null is empty; structured content is kept as its JSON text rather
/// than dropped.
pub(crate) fn content_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// `tool_calls` as a list of entries: a single object counts as one entry.
///
/// Returns `Err` when the field is present but neither a list nor an object.
pub(crate) fn tool_call_entries(value: Option<&Value>) -> Result<Vec<&Value>, String> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().collect()),
        Some(obj @ Value::Object(_)) => Ok(vec![obj]),
        Some(other) => Err(format!("tool_calls has unsupported type: {}", json_type(other))),
    }
}

/// JSON-encode an arguments container. Strings are assumed already encoded.
pub(crate) fn encode_arguments(args: &Value) -> String {
    match args {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JSON-encode an argument object. A string is decoded first and must hold an
/// object; the result is re-encoded compactly.
pub(crate) fn encode_object_arguments(field: &str, args: &Value) -> Result<String, String> {
    match args {
        Value::Object(_) => Ok(args.to_string()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(decoded @ Value::Object(_)) => Ok(decoded.to_string()),
            Ok(other) => Err(format!("{} string holds a {}, not an object", field, json_type(&other))),
            Err(e) => Err(format!("{} string is not valid JSON: {}", field, e)),
        },
        other => Err(format!("{} is a {}", field, json_type(other))),
    }
}

/// Upstream id when it is a non-empty string, else a freshly generated one.
pub(crate) fn call_id(entry: &Map<String, Value>) -> String {
    entry
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(crate::types::tool::generate_call_id)
}

pub(crate) fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
