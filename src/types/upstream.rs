//! Request bodies understood by the upstream inference gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::Message;

/// Chat (and legacy prompt) request sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamChatRequest {
    pub user: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Vec<Value>>,
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub stop: Vec<String>,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Native tool block, already reshaped for the model family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
}

impl UpstreamChatRequest {
    pub fn chat(
        user: impl Into<String>,
        model: impl Into<String>,
        messages: Vec<Message>,
        temperature: f64,
    ) -> Self {
        Self {
            user: user.into(),
            model: model.into(),
            messages: Some(messages),
            prompt: None,
            system: String::new(),
            stop: Vec::new(),
            temperature,
            max_tokens: None,
            tools: None,
            tool_choice: None,
        }
    }

    pub fn completion(
        user: impl Into<String>,
        model: impl Into<String>,
        prompt: Value,
        temperature: f64,
    ) -> Self {
        Self {
            user: user.into(),
            model: model.into(),
            messages: None,
            prompt: Some(vec![prompt]),
            system: String::new(),
            stop: Vec::new(),
            temperature,
            max_tokens: None,
            tools: None,
            tool_choice: None,
        }
    }

    pub fn with_stop(mut self, stop: Option<&Value>) -> Self {
        self.stop = stop_sequences(stop);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Normalize OpenAI `stop` (string, list, or absent) to a list.
pub fn stop_sequences(stop: Option<&Value>) -> Vec<String> {
    match stop {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

/// Embedding batch sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamEmbedRequest {
    pub user: String,
    pub model: String,
    pub prompt: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stop_sequences_normalization() {
        assert_eq!(stop_sequences(Some(&json!("END"))), vec!["END"]);
        assert_eq!(stop_sequences(Some(&json!(["a", "b", 3]))), vec!["a", "b"]);
        assert!(stop_sequences(None).is_empty());
    }

    #[test]
    fn test_chat_request_omits_tool_fields_when_unset() {
        let req = UpstreamChatRequest::chat("bridge", "gpt4o", vec![Message::user("hi")], 0.1);
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("tools").is_none());
        assert!(v.get("tool_choice").is_none());
        assert!(v.get("prompt").is_none());
        assert_eq!(v["system"], "");
        assert_eq!(v["stop"], json!([]));
    }
}
