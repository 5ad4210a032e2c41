//! Output adapters: universal [`ToolCall`]s rendered in the shapes OpenAI
//! clients consume. All adapters preserve input order.

use serde_json::Value;

use crate::types::openai::{
    ChatCompletionMessageToolCall, ChoiceDeltaFunction, ChoiceDeltaToolCall, FunctionCall,
    ResponseFunctionToolCall,
};
use crate::types::tool::ToolCall;
use crate::{Error, Result};

/// Non-streaming chat-completion `message.tool_calls`.
pub fn to_chat_completion_tool_calls(calls: &[ToolCall]) -> Vec<ChatCompletionMessageToolCall> {
    calls
        .iter()
        .map(|c| ChatCompletionMessageToolCall {
            id: c.id.clone(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: c.name.clone(),
                arguments: c.arguments.clone(),
            },
        })
        .collect()
}

/// Responses-API `function_call` output items.
pub fn to_response_function_calls(calls: &[ToolCall]) -> Vec<ResponseFunctionToolCall> {
    calls
        .iter()
        .map(|c| ResponseFunctionToolCall {
            item_type: "function_call".to_string(),
            call_id: c.id.clone(),
            name: c.name.clone(),
            arguments: c.arguments.clone(),
            status: "completed".to_string(),
        })
        .collect()
}

/// One complete call as a single streaming delta at `index`.
pub fn to_stream_delta(call: &ToolCall, index: u32) -> ChoiceDeltaToolCall {
    ChoiceDeltaToolCall {
        index,
        id: Some(call.id.clone()),
        call_type: Some("function".to_string()),
        function: Some(ChoiceDeltaFunction {
            name: Some(call.name.clone()),
            arguments: Some(call.arguments.clone()),
        }),
    }
}

/// Streaming delta from an untyped value.
///
/// Anything that does not decode as a [`ToolCall`] is a caller bug and yields
/// [`Error::ContractViolation`].
pub fn stream_delta_from_value(value: &Value, index: u32) -> Result<ChoiceDeltaToolCall> {
    let call: ToolCall = serde_json::from_value(value.clone()).map_err(|e| {
        Error::contract_violation(
            "to_stream_delta",
            format!("expected a tool call {{id, name, arguments}}: {}", e),
        )
    })?;
    Ok(to_stream_delta(&call, index))
}
