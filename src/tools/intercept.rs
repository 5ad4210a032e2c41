//! Response-side tool interception.
//!
//! Turns whatever the upstream returned into universal [`ToolCall`]s plus the
//! text the user should see. Never fails: malformed entries and unknown shapes
//! are reported as [`Diagnostic`]s and logged inside the caller's span.

use serde_json::Value;
use tracing::{debug, warn, Span};

use crate::drivers::{driver_for, json_type, Extraction};
use crate::registry::ModelFamily;
use crate::tools::prompt::scan_tool_calls;
use crate::tools::{Diagnostic, Interception};

/// Keys that mark an object as a model response for every family.
const RESPONSE_KEYS: [&str; 2] = ["content", "tool_calls"];

#[derive(Debug, Clone)]
pub struct ToolInterceptor {
    span: Span,
}

impl ToolInterceptor {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Interceptor that logs into the current span.
    pub fn current() -> Self {
        Self::new(Span::current())
    }

    /// Decode `payload` for `family`.
    ///
    /// `family` is the effective family of the request: callers that injected
    /// the prompt protocol pass [`ModelFamily::PromptBased`].
    pub fn process(&self, payload: &Value, family: ModelFamily) -> Interception {
        let _guard = self.span.enter();
        let payload = unwrap_response(payload);

        let extraction = match payload {
            Value::String(text) => scan_tool_calls(text),
            Value::Object(map) if RESPONSE_KEYS.iter().any(|k| map.contains_key(*k)) => {
                driver_for(family).extract(map)
            }
            Value::Object(_) => unrecoverable(payload.to_string(), "object has neither content nor tool_calls"),
            Value::Null => unrecoverable(String::new(), "payload is null"),
            other => unrecoverable(other.to_string(), format!("payload is a {}", json_type(other))),
        };

        for diagnostic in &extraction.diagnostics {
            warn!(family = %family, "{}", diagnostic);
        }
        let Extraction {
            text,
            calls,
            diagnostics,
        } = extraction;
        debug!(family = %family, calls = calls.len(), text_len = text.len(), "Intercepted response");

        Interception {
            tool_calls: if calls.is_empty() { None } else { Some(calls) },
            text,
            diagnostics,
        }
    }
}

/// Gateway responses wrap the model output in a `response` field.
fn unwrap_response(payload: &Value) -> &Value {
    match payload {
        Value::Object(map) => map.get("response").unwrap_or(payload),
        _ => payload,
    }
}

fn unrecoverable(text: String, reason: impl Into<String>) -> Extraction {
    Extraction {
        text,
        calls: Vec::new(),
        diagnostics: vec![Diagnostic::PayloadUnrecoverable {
            reason: reason.into(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intercept(payload: Value, family: ModelFamily) -> Interception {
        ToolInterceptor::current().process(&payload, family)
    }

    #[test]
    fn test_plain_string_response() {
        let out = intercept(json!({"response": "Hello!"}), ModelFamily::OpenAi);
        assert_eq!(out.text, "Hello!");
        assert!(out.tool_calls.is_none());
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_string_is_scanned_for_any_family() {
        let payload = json!({"response": "<tool_call>{\"name\": \"f\", \"arguments\": {}}</tool_call>"});
        let out = intercept(payload, ModelFamily::Anthropic);
        assert_eq!(out.calls()[0].name, "f");
        assert_eq!(out.text, "");
    }

    #[test]
    fn test_all_entries_dropped_gives_none() {
        let payload = json!({"response": {"content": "hm", "tool_calls": [{"function": 1}]}});
        let out = intercept(payload, ModelFamily::OpenAi);
        assert!(out.tool_calls.is_none());
        assert_eq!(out.text, "hm");
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].to_string().contains("Failed"));
    }

    #[test]
    fn test_unrecoverable_payloads_keep_raw_text() {
        let out = intercept(Value::Null, ModelFamily::Google);
        assert_eq!(out.text, "");
        assert!(matches!(out.diagnostics[0], Diagnostic::PayloadUnrecoverable { .. }));

        let out = intercept(json!({"response": 42}), ModelFamily::Google);
        assert_eq!(out.text, "42");

        let out = intercept(json!({"unexpected": true}), ModelFamily::OpenAi);
        assert_eq!(out.text, r#"{"unexpected":true}"#);
        assert!(out.tool_calls.is_none());
    }

    #[test]
    fn test_unwrapped_payload_accepted() {
        let out = intercept(json!({"content": "direct"}), ModelFamily::OpenAi);
        assert_eq!(out.text, "direct");
    }
}
