//! OpenAI 格式驱动：`{type: function, function: {...}}` 工具块与 `tool_calls` 列表解码
//!
//! OpenAI chat-completions family:
//! - Tools are `{"type": "function", "function": {name, description, parameters}}`.
//! - `tool_choice` is passed through in its OpenAI form.
//! - Responses carry `content` plus a `tool_calls` list whose entries look like
//!   `{"id", "type": "function", "function": {"name", "arguments"}}`.

use serde_json::{json, Map, Value};

use crate::registry::ModelFamily;
use crate::tools::prompt::{PromptTemplate, ToolListing};
use crate::types::tool::{Tool, ToolCall, ToolChoice};

use super::{call_id, content_text, encode_arguments, json_type, tool_call_entries, Extraction, FamilyDriver};

static TEMPLATE: PromptTemplate = PromptTemplate {
    preamble: "You have access to the following functions. Use them when they help answer the user.",
    listing: ToolListing::Markdown,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiDriver;

impl FamilyDriver for OpenAiDriver {
    fn family(&self) -> ModelFamily {
        ModelFamily::OpenAi
    }

    fn native_tools(&self, tools: &[Tool]) -> Option<Value> {
        Some(Value::Array(
            tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect(),
        ))
    }

    fn native_tool_choice(&self, choice: &ToolChoice) -> Option<Value> {
        Some(choice.to_openai())
    }

    fn prompt_template(&self) -> &'static PromptTemplate {
        &TEMPLATE
    }

    fn extract(&self, payload: &Map<String, Value>) -> Extraction {
        let mut out = Extraction::with_text(content_text(payload.get("content")));
        match tool_call_entries(payload.get("tool_calls")) {
            Ok(entries) => {
                for (index, entry) in entries.into_iter().enumerate() {
                    match parse_tool_call(entry) {
                        Ok(call) => out.calls.push(call),
                        Err(reason) => out.skip(index, reason),
                    }
                }
            }
            Err(reason) => out.skip(0, reason),
        }
        out
    }
}

/// Decode one `{"id", "type", "function": {"name", "arguments"}}` entry.
///
/// `arguments` may arrive as an already-encoded string or as an object.
pub(crate) fn parse_tool_call(entry: &Value) -> Result<ToolCall, String> {
    let obj = entry
        .as_object()
        .ok_or_else(|| format!("entry is a {}, not an object", json_type(entry)))?;
    let function = obj
        .get("function")
        .and_then(Value::as_object)
        .ok_or("missing 'function' object")?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or("missing function name")?;
    let arguments = match function.get("arguments") {
        None | Some(Value::Null) => "{}".to_string(),
        Some(args @ (Value::String(_) | Value::Object(_))) => encode_arguments(args),
        Some(other) => return Err(format!("arguments is a {}", json_type(other))),
    };
    Ok(ToolCall::new(call_id(obj), name, arguments))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather_tool() -> Tool {
        Tool::new(
            "get_weather",
            "Current weather for a city",
            json!({"type": "object", "properties": {"location": {"type": "string"}}}),
        )
    }

    #[test]
    fn test_native_tools_shape() {
        let tools = OpenAiDriver.native_tools(&[weather_tool()]).unwrap();
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["function"]["name"], "get_weather");
        assert_eq!(tools[0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_extract_tool_calls() {
        let payload = json!({
            "content": "Checking.",
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"location\": \"Paris\"}"}
            }]
        });
        let out = OpenAiDriver.extract(payload.as_object().unwrap());
        assert_eq!(out.text, "Checking.");
        assert_eq!(
            out.calls,
            vec![ToolCall::new("call_1", "get_weather", "{\"location\": \"Paris\"}")]
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_object_arguments_are_encoded() {
        let call = parse_tool_call(&json!({
            "function": {"name": "calc", "arguments": {"expression": "2+2"}}
        }))
        .unwrap();
        assert_eq!(call.arguments, r#"{"expression":"2+2"}"#);
        assert!(call.id.starts_with("call_"));
    }

    #[test]
    fn test_malformed_entries_skipped_in_order() {
        let payload = json!({
            "content": null,
            "tool_calls": [
                {"id": "a", "function": {"name": "first", "arguments": "{}"}},
                {"id": "b", "function": "not-an-object"},
                "garbage",
                {"id": "d", "function": {"name": "fourth", "arguments": "{}"}}
            ]
        });
        let out = OpenAiDriver.extract(payload.as_object().unwrap());
        assert_eq!(out.text, "");
        let names: Vec<_> = out.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["first", "fourth"]);
        assert_eq!(out.diagnostics.len(), 2);
    }
}
