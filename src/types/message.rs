//! Chat message format accepted from OpenAI-compatible clients

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, ErrorContext, Result};

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Assistant tool calls in OpenAI wire form, kept raw for passthrough.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_text(MessageRole::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_text(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_text(MessageRole::Assistant, text)
    }

    pub fn tool(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_text(MessageRole::Tool, text)
        }
    }

    pub fn with_text(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(text.into())),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Concatenated text of this message; non-text parts are ignored.
    pub fn text(&self) -> String {
        match &self.content {
            None => String::new(),
            Some(MessageContent::Text(s)) => s.clone(),
            Some(MessageContent::Parts(parts)) => parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Collapse a multimodal parts array into plain text joined by a space.
    ///
    /// Fails on the first non-text part, naming its type.
    pub fn flatten_to_text(&mut self) -> Result<()> {
        let Some(MessageContent::Parts(parts)) = &self.content else {
            return Ok(());
        };
        let mut texts = Vec::with_capacity(parts.len());
        for part in parts {
            if part.part_type != "text" {
                return Err(Error::validation_with_context(
                    format!(
                        "Model only supports text content. Found unsupported content type: '{}'",
                        part.part_type
                    ),
                    ErrorContext::new()
                        .with_field_path("request.messages[].content[].type")
                        .with_source("message_flatten"),
                ));
            }
            texts.push(part.text.clone().unwrap_or_default());
        }
        self.content = Some(MessageContent::Text(texts.join(" ")));
        Ok(())
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Developer,
    User,
    Assistant,
    Tool,
    Function,
}

/// Message content (either a string or an array of typed parts)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One element of a multimodal content array. Unknown part types are preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            part_type: "text".to_string(),
            text: Some(text.into()),
            extra: Map::new(),
        }
    }
}
