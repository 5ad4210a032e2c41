//! Universal tool-calling types, independent of any vendor schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, ErrorContext, Result};

/// Inbound tool definition as sent by OpenAI-compatible clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String, // "function"
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>, // JSON Schema
}

/// A declared capability the model may invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON Schema document describing the arguments object.
    pub parameters: Value,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Build a universal tool from the client's `{type:"function", function:{...}}` entry.
    pub fn from_definition(def: &ToolDefinition) -> Result<Self> {
        if def.tool_type != "function" {
            return Err(Error::validation_with_context(
                format!("Unsupported tool type: '{}'", def.tool_type),
                ErrorContext::new()
                    .with_field_path("request.tools[].type")
                    .with_source("tool_types"),
            ));
        }
        if def.function.name.trim().is_empty() {
            return Err(Error::validation_with_context(
                "Tool function name must not be empty",
                ErrorContext::new()
                    .with_field_path("request.tools[].function.name")
                    .with_source("tool_types"),
            ));
        }
        Ok(Self {
            name: def.function.name.clone(),
            description: def.function.description.clone().unwrap_or_default(),
            parameters: def
                .function
                .parameters
                .clone()
                .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
        })
    }

    pub fn from_definitions(defs: &[ToolDefinition]) -> Result<Vec<Self>> {
        defs.iter().map(Self::from_definition).collect()
    }
}

/// Caller's directive on whether, and which, tool the model must invoke.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    Required,
    None,
    Named(String),
}

impl ToolChoice {
    /// Parse the OpenAI `tool_choice` field.
    ///
    /// Accepts `"auto"`, `"required"`, `"none"` or
    /// `{"type": "function", "function": {"name": ...}}`. Anything else is a
    /// validation error naming the offending value.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => match s.as_str() {
                "auto" => Ok(ToolChoice::Auto),
                "required" => Ok(ToolChoice::Required),
                "none" => Ok(ToolChoice::None),
                _ => Err(invalid_choice(value)),
            },
            Value::Object(map) => {
                if map.get("type").and_then(Value::as_str) != Some("function") {
                    return Err(invalid_choice(value));
                }
                map.get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(Value::as_str)
                    .filter(|name| !name.is_empty())
                    .map(|name| ToolChoice::Named(name.to_string()))
                    .ok_or_else(|| invalid_choice(value))
            }
            _ => Err(invalid_choice(value)),
        }
    }

    /// Parse an optional field; absence means `Auto`.
    pub fn from_optional(value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(ToolChoice::Auto),
            Some(v) => Self::from_value(v),
        }
    }

    /// OpenAI wire form.
    pub fn to_openai(&self) -> Value {
        match self {
            ToolChoice::Auto => Value::String("auto".into()),
            ToolChoice::Required => Value::String("required".into()),
            ToolChoice::None => Value::String("none".into()),
            ToolChoice::Named(name) => {
                serde_json::json!({"type": "function", "function": {"name": name}})
            }
        }
    }
}

fn invalid_choice(value: &Value) -> Error {
    Error::validation_with_context(
        format!(
            "Invalid tool_choice: {}. Expected \"auto\", \"required\", \"none\" or {{\"type\": \"function\", \"function\": {{\"name\": ...}}}}",
            value
        ),
        ErrorContext::new()
            .with_field_path("request.tool_choice")
            .with_source("tool_injector"),
    )
}

/// A model-issued request to invoke a named tool.
///
/// `arguments` is always the JSON-encoded arguments object, kept as text so the
/// upstream formatting survives for clients that re-parse it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decode `arguments` back into JSON.
    pub fn arguments_value(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.arguments)?)
    }
}

/// Synthesize an OpenAI-style call id (`call_` + 24 hex chars).
pub fn generate_call_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("call_{}", &hex[..24])
}
