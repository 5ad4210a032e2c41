//! Anthropic 格式驱动：`input_schema` 工具块、`tool_use` 内容块解码
//!
//! Anthropic Messages family. Key differences from OpenAI:
//! - Tools are flat `{name, description, input_schema}` objects.
//! - `tool_choice` is `{"type": "auto" | "any" | "none"}` or `{"type": "tool", "name"}`.
//! - Response content may be a string or a list of typed blocks; calls arrive
//!   either as `tool_use` blocks or in a `tool_calls` list of
//!   `{id, name, type: "tool_use", input}` entries.

use serde_json::{json, Map, Value};

use crate::registry::ModelFamily;
use crate::tools::prompt::{PromptTemplate, ToolListing};
use crate::types::tool::{Tool, ToolCall, ToolChoice};

use super::{
    call_id, content_text, encode_object_arguments, json_type, tool_call_entries, Extraction, FamilyDriver,
};

static TEMPLATE: PromptTemplate = PromptTemplate {
    preamble: "In this environment you have access to a set of tools you can use to answer the user's question.",
    listing: ToolListing::Xml,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct AnthropicDriver;

impl FamilyDriver for AnthropicDriver {
    fn family(&self) -> ModelFamily {
        ModelFamily::Anthropic
    }

    fn native_tools(&self, tools: &[Tool]) -> Option<Value> {
        Some(Value::Array(
            tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect(),
        ))
    }

    fn native_tool_choice(&self, choice: &ToolChoice) -> Option<Value> {
        Some(match choice {
            ToolChoice::Auto => json!({"type": "auto"}),
            ToolChoice::Required => json!({"type": "any"}),
            ToolChoice::None => json!({"type": "none"}),
            ToolChoice::Named(name) => json!({"type": "tool", "name": name}),
        })
    }

    fn prompt_template(&self) -> &'static PromptTemplate {
        &TEMPLATE
    }

    fn extract(&self, payload: &Map<String, Value>) -> Extraction {
        let mut out = match payload.get("content") {
            Some(Value::Array(blocks)) => extract_blocks(blocks),
            other => Extraction::with_text(content_text(other)),
        };

        // Block indices and list indices are reported separately; list entries
        // are offset so every skipped entry keeps a unique position.
        let offset = out.calls.len() + out.diagnostics.len();
        let mut listed = Extraction::default();
        match tool_call_entries(payload.get("tool_calls")) {
            Ok(entries) => {
                for (index, entry) in entries.into_iter().enumerate() {
                    match parse_tool_use(entry) {
                        Ok(call) => listed.calls.push(call),
                        Err(reason) => listed.skip(offset + index, reason),
                    }
                }
            }
            Err(reason) => listed.skip(offset, reason),
        }
        out.merge(listed);
        out
    }
}

/// Typed content blocks: text is concatenated, `tool_use` becomes a call,
/// other block types (thinking, citations) carry nothing for the client.
fn extract_blocks(blocks: &[Value]) -> Extraction {
    let mut out = Extraction::default();
    for (index, block) in blocks.iter().enumerate() {
        let Some(obj) = block.as_object() else {
            out.skip(index, format!("content block is a {}", json_type(block)));
            continue;
        };
        match obj.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = obj.get("text").and_then(Value::as_str) {
                    out.text.push_str(text);
                }
            }
            Some("tool_use") => match parse_tool_use(block) {
                Ok(call) => out.calls.push(call),
                Err(reason) => out.skip(index, reason),
            },
            _ => {}
        }
    }
    out
}

/// Decode `{id, name, input}`. OpenAI-shaped entries are accepted too since
/// some gateway deployments normalize Claude output before returning it.
fn parse_tool_use(entry: &Value) -> Result<ToolCall, String> {
    let obj = entry
        .as_object()
        .ok_or_else(|| format!("entry is a {}, not an object", json_type(entry)))?;
    if obj.contains_key("function") && !obj.contains_key("input") {
        return super::openai::parse_tool_call(entry);
    }
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or("missing tool name")?;
    let arguments = match obj.get("input") {
        None | Some(Value::Null) => "{}".to_string(),
        Some(input) => encode_object_arguments("input", input)?,
    };
    Ok(ToolCall::new(call_id(obj), name, arguments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Diagnostic;

    #[test]
    fn test_native_tools_use_input_schema() {
        let tool = Tool::new("search", "Search the web", json!({"type": "object"}));
        let tools = AnthropicDriver.native_tools(&[tool]).unwrap();
        assert_eq!(tools[0]["name"], "search");
        assert_eq!(tools[0]["input_schema"]["type"], "object");
        assert!(tools[0].get("parameters").is_none());
    }

    #[test]
    fn test_tool_choice_mapping() {
        let d = AnthropicDriver;
        assert_eq!(d.native_tool_choice(&ToolChoice::Required).unwrap(), json!({"type": "any"}));
        assert_eq!(
            d.native_tool_choice(&ToolChoice::Named("search".into())).unwrap(),
            json!({"type": "tool", "name": "search"})
        );
    }

    #[test]
    fn test_extract_tool_calls_list() {
        let payload = json!({
            "content": "Let me calculate that.",
            "tool_calls": [{
                "id": "toolu_01",
                "name": "calculate",
                "type": "tool_use",
                "input": {"expression": "6*7"}
            }]
        });
        let out = AnthropicDriver.extract(payload.as_object().unwrap());
        assert_eq!(out.text, "Let me calculate that.");
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].id, "toolu_01");
        assert_eq!(out.calls[0].arguments, r#"{"expression":"6*7"}"#);
    }

    #[test]
    fn test_extract_content_blocks() {
        let payload = json!({
            "content": [
                {"type": "text", "text": "Looking up "},
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "the weather."},
                {"type": "tool_use", "id": "toolu_9", "name": "get_weather", "input": {"location": "Oslo"}}
            ]
        });
        let out = AnthropicDriver.extract(payload.as_object().unwrap());
        assert_eq!(out.text, "Looking up the weather.");
        assert_eq!(out.calls[0].name, "get_weather");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_entry_without_name_is_skipped() {
        let payload = json!({
            "content": "",
            "tool_calls": [{"id": "x", "input": {}}, {"id": "y", "name": "ok", "input": {}}]
        });
        let out = AnthropicDriver.extract(payload.as_object().unwrap());
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].id, "y");
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn test_string_input_is_decoded_to_an_object() {
        let payload = json!({"content": [
            {"type": "tool_use", "id": "a", "name": "calc", "input": "{\"x\": 2}"},
            {"type": "tool_use", "id": "b", "name": "calc", "input": "2+2"}
        ]});
        let out = AnthropicDriver.extract(payload.as_object().unwrap());
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].arguments, "{\"x\":2}");
        assert!(matches!(out.diagnostics[0], Diagnostic::EntrySkipped { index: 1, .. }));
    }
}
