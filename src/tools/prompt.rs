//! The `<tool_call>` text protocol used when a model has no native tool calling.
//!
//! Outbound, [`render_tool_prompt`] describes the tools and the call format in a
//! system-prompt fragment. Inbound, [`scan_tool_calls`] recovers each tagged
//! call and strips every tag from the visible text.

use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::drivers::{encode_object_arguments, json_type, Extraction};
use crate::types::tool::{generate_call_id, Tool, ToolCall, ToolChoice};

static TOOL_CALL_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").expect("tool_call tag pattern"));

const CALL_FORMAT: &str = "To call a tool, reply with a block of exactly this form:\n\
<tool_call>{\"name\": \"<tool name>\", \"arguments\": {<arguments as a JSON object>}}</tool_call>\n\
Emit one block per call; several blocks are allowed. Text outside the blocks is shown to the user.";

/// How a family's template lists the tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolListing {
    /// `### name` sections.
    Markdown,
    /// `<tool name="...">` elements.
    Xml,
    /// One `- name: description` line each, schema indented below.
    Bullets,
}

/// Family-specific wording around the shared call format.
#[derive(Debug)]
pub struct PromptTemplate {
    pub preamble: &'static str,
    pub listing: ToolListing,
}

/// System-prompt fragment declaring `tools` and the `<tool_call>` format.
pub fn render_tool_prompt(template: &PromptTemplate, tools: &[Tool], choice: &ToolChoice) -> String {
    let mut out = String::new();
    out.push_str(template.preamble);
    out.push_str("\n\n");

    for tool in tools {
        let schema = serde_json::to_string(&tool.parameters).unwrap_or_else(|_| "{}".to_string());
        // Writing into a String cannot fail.
        let _ = match template.listing {
            ToolListing::Markdown => write!(
                out,
                "### {}\n{}\nParameters (JSON Schema): {}\n\n",
                tool.name, tool.description, schema
            ),
            ToolListing::Xml => write!(
                out,
                "<tool name=\"{}\">\n<description>{}</description>\n<parameters>{}</parameters>\n</tool>\n\n",
                tool.name, tool.description, schema
            ),
            ToolListing::Bullets => write!(
                out,
                "- {}: {}\n  parameters: {}\n",
                tool.name, tool.description, schema
            ),
        };
    }
    if template.listing == ToolListing::Bullets {
        out.push('\n');
    }

    out.push_str(CALL_FORMAT);
    if let Some(directive) = choice_directive(choice) {
        out.push_str("\n\n");
        out.push_str(&directive);
    }
    out
}

fn choice_directive(choice: &ToolChoice) -> Option<String> {
    match choice {
        ToolChoice::Auto => None,
        ToolChoice::Required => Some("You must call at least one tool in this reply.".to_string()),
        ToolChoice::None => Some("Do not call any tools in this reply.".to_string()),
        ToolChoice::Named(name) => Some(format!("You must call the tool \"{}\" in this reply.", name)),
    }
}

/// Recover tagged calls from `text`.
///
/// Every tagged segment is removed from the returned text, including ones whose
/// body fails to parse; the remaining fragments are concatenated as-is. Text
/// without tags is returned unchanged.
pub fn scan_tool_calls(text: &str) -> Extraction {
    let mut out = Extraction::default();
    let mut tagged = false;
    for (index, caps) in TOOL_CALL_TAG.captures_iter(text).enumerate() {
        tagged = true;
        let body = caps.get(1).map_or("", |m| m.as_str());
        match parse_tagged_call(body.trim()) {
            Ok(call) => out.calls.push(call),
            Err(reason) => out.skip(index, reason),
        }
    }
    out.text = if tagged {
        TOOL_CALL_TAG.replace_all(text, "").into_owned()
    } else {
        text.to_string()
    };
    out
}

/// Encode a call as the tag the model would have written. Used to replay
/// assistant history to prompt-based models.
pub fn format_tool_call_tag(name: &str, arguments: &str) -> String {
    let args: Value = serde_json::from_str(arguments).unwrap_or_else(|_| Value::String(arguments.to_string()));
    format!(
        "<tool_call>{}</tool_call>",
        serde_json::json!({"name": name, "arguments": args})
    )
}

fn parse_tagged_call(body: &str) -> Result<ToolCall, String> {
    let value: Value = serde_json::from_str(body).map_err(|e| format!("invalid JSON in tool_call tag: {}", e))?;
    let obj = value
        .as_object()
        .ok_or_else(|| format!("tool_call body is a {}, not an object", json_type(&value)))?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or("missing tool name")?;
    let arguments = match obj.get("arguments") {
        None | Some(Value::Null) => return Err("missing arguments".to_string()),
        Some(args) => encode_object_arguments("arguments", args)?,
    };
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(generate_call_id);
    Ok(ToolCall::new(id, name, arguments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static TEMPLATE: PromptTemplate = PromptTemplate {
        preamble: "Tools:",
        listing: ToolListing::Markdown,
    };

    #[test]
    fn test_render_lists_every_tool_and_format() {
        let tools = vec![
            Tool::new("get_weather", "Weather lookup", json!({"type": "object"})),
            Tool::new("calculate", "Arithmetic", json!({"type": "object"})),
        ];
        let text = render_tool_prompt(&TEMPLATE, &tools, &ToolChoice::Auto);
        assert!(text.starts_with("Tools:"));
        assert!(text.contains("### get_weather"));
        assert!(text.contains("### calculate"));
        assert!(text.contains("<tool_call>"));
        assert!(!text.contains("must call"));
    }

    #[test]
    fn test_render_named_choice_directive() {
        let tools = vec![Tool::new("search", "", json!({}))];
        let text = render_tool_prompt(&TEMPLATE, &tools, &ToolChoice::Named("search".into()));
        assert!(text.ends_with("You must call the tool \"search\" in this reply."));
    }

    #[test]
    fn test_scan_plain_text_unchanged() {
        let out = scan_tool_calls("  just words  ");
        assert!(out.calls.is_empty());
        assert_eq!(out.text, "  just words  ");
    }

    #[test]
    fn test_scan_multiple_calls_in_order() {
        let text = "A <tool_call>{\"name\": \"one\", \"arguments\": {}}</tool_call> B \
                    <tool_call>\n{\"name\": \"two\", \"arguments\": \"{\\\"k\\\": 1}\"}\n</tool_call>";
        let out = scan_tool_calls(text);
        let names: Vec<_> = out.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["one", "two"]);
        assert_eq!(out.calls[1].arguments, "{\"k\":1}");
        assert_eq!(out.text, "A  B ");
    }

    #[test]
    fn test_scan_strips_malformed_tags() {
        let out = scan_tool_calls("Hi <tool_call>not json</tool_call>!");
        assert!(out.calls.is_empty());
        assert_eq!(out.text, "Hi !");
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn test_scan_requires_object_arguments() {
        let text = "<tool_call>{\"name\": \"h\"}</tool_call>\
                    <tool_call>{\"name\": \"f\", \"arguments\": null}</tool_call>\
                    <tool_call>{\"name\": \"f\", \"arguments\": \"oops\"}</tool_call>\
                    <tool_call>{\"name\": \"f\", \"arguments\": \"[1,2]\"}</tool_call>\
                    <tool_call>{\"name\": \"f\", \"arguments\": [1, 2]}</tool_call>";
        let out = scan_tool_calls(text);
        assert!(out.calls.is_empty());
        assert_eq!(out.text, "");
        assert_eq!(out.diagnostics.len(), 5);
        assert!(out.diagnostics[0].to_string().contains("missing arguments"));
    }

    #[test]
    fn test_format_tag_round_trips_through_scanner() {
        let tag = format_tool_call_tag("get_weather", r#"{"location":"Paris"}"#);
        let out = scan_tool_calls(&tag);
        assert_eq!(out.calls[0].name, "get_weather");
        assert_eq!(out.calls[0].arguments, r#"{"location":"Paris"}"#);
        assert_eq!(out.text, "");
    }
}
