//! Prompt-based family: no native tool block, calls are recovered from
//! `<tool_call>` tags in the response text.

use serde_json::{Map, Value};

use crate::registry::ModelFamily;
use crate::tools::prompt::{scan_tool_calls, PromptTemplate, ToolListing};
use crate::types::tool::{Tool, ToolChoice};

use super::{content_text, Extraction, FamilyDriver};

static TEMPLATE: PromptTemplate = PromptTemplate {
    preamble: "You have access to the following tools. You cannot call them directly; instead, request a call using the exact format described below.",
    listing: ToolListing::Markdown,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct PromptDriver;

impl FamilyDriver for PromptDriver {
    fn family(&self) -> ModelFamily {
        ModelFamily::PromptBased
    }

    fn native_tools(&self, _tools: &[Tool]) -> Option<Value> {
        None
    }

    fn native_tool_choice(&self, _choice: &ToolChoice) -> Option<Value> {
        None
    }

    fn prompt_template(&self) -> &'static PromptTemplate {
        &TEMPLATE
    }

    fn extract(&self, payload: &Map<String, Value>) -> Extraction {
        scan_tool_calls(&content_text(payload.get("content")))
    }
}
