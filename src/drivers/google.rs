//! Google 格式驱动：`functionDeclarations` 工具块与 `args` 调用解码
//!
//! Google Gemini family:
//! - Tools are `{name, description, parameters}` declarations.
//! - `tool_choice` becomes `functionCallingConfig` with mode `AUTO`, `ANY` or
//!   `NONE`, plus `allowedFunctionNames` when one function is forced.
//! - `tool_calls` in the response is a single object or a list of
//!   `{id?, name, args}` entries; `functionCall` wrappers are unwrapped.

use serde_json::{json, Map, Value};

use crate::registry::ModelFamily;
use crate::tools::prompt::{PromptTemplate, ToolListing};
use crate::types::tool::{Tool, ToolCall, ToolChoice};

use super::{
    call_id, content_text, encode_object_arguments, json_type, tool_call_entries, Extraction, FamilyDriver,
};

static TEMPLATE: PromptTemplate = PromptTemplate {
    preamble: "You can call the functions declared below to complete the task.",
    listing: ToolListing::Bullets,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleDriver;

impl FamilyDriver for GoogleDriver {
    fn family(&self) -> ModelFamily {
        ModelFamily::Google
    }

    fn native_tools(&self, tools: &[Tool]) -> Option<Value> {
        Some(Value::Array(
            tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect(),
        ))
    }

    fn native_tool_choice(&self, choice: &ToolChoice) -> Option<Value> {
        Some(match choice {
            ToolChoice::Auto => json!({"functionCallingConfig": {"mode": "AUTO"}}),
            ToolChoice::Required => json!({"functionCallingConfig": {"mode": "ANY"}}),
            ToolChoice::None => json!({"functionCallingConfig": {"mode": "NONE"}}),
            ToolChoice::Named(name) => json!({
                "functionCallingConfig": {"mode": "ANY", "allowedFunctionNames": [name]}
            }),
        })
    }

    fn prompt_template(&self) -> &'static PromptTemplate {
        &TEMPLATE
    }

    fn extract(&self, payload: &Map<String, Value>) -> Extraction {
        let mut out = Extraction::with_text(content_text(payload.get("content")));
        match tool_call_entries(payload.get("tool_calls")) {
            Ok(entries) => {
                for (index, entry) in entries.into_iter().enumerate() {
                    match parse_function_call(entry) {
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

/// Decode `{id?, name, args}` (optionally wrapped in `functionCall`).
///
/// Absent `args` is a zero-argument call and encodes as `{}`.
fn parse_function_call(entry: &Value) -> Result<ToolCall, String> {
    let outer = entry
        .as_object()
        .ok_or_else(|| format!("entry is a {}, not an object", json_type(entry)))?;
    let obj = match outer.get("functionCall").and_then(Value::as_object) {
        Some(inner) => inner,
        None => outer,
    };
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or("missing function name")?;
    let arguments = match obj.get("args") {
        None | Some(Value::Null) => "{}".to_string(),
        Some(args) => encode_object_arguments("args", args)?,
    };
    // The id may sit on the wrapper or the inner call.
    let id = if obj.contains_key("id") { call_id(obj) } else { call_id(outer) };
    Ok(ToolCall::new(id, name, arguments))
}
