//! 流式输出：`chat.completion.chunk` 事件构造与 SSE 帧编码
//!
//! Streaming output towards clients.
//!
//! Two producers share the chunk builders below:
//! - [`assembler::ChunkAssembler`] replays one completed response as a chunk
//!   sequence (emulated streaming; always used when tools are declared).
//! - [`relay::relay_upstream`] forwards true incremental upstream text.
//!
//! Both end with a `finish_reason` chunk followed by `data: [DONE]`.

pub mod assembler;
pub mod relay;

use bytes::Bytes;
use serde::Serialize;

use crate::tools::adapters::to_stream_delta;
use crate::types::openai::{ChatCompletionChunk, ChunkChoice, ChunkDelta, FinishReason};
use crate::types::tool::ToolCall;

pub use assembler::{AssemblerState, ChunkAssembler, StreamFrame};
pub use relay::relay_upstream;

/// Terminal SSE line.
pub const SSE_DONE: &str = "data: [DONE]\n\n";

/// Fingerprint reported on the finishing chunk.
pub const SYSTEM_FINGERPRINT: &str = "fp_gateway_bridge";

/// Identity shared by every chunk of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMeta {
    pub id: String,
    pub model: String,
    pub created: i64,
}

impl ChunkMeta {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            model: model.into(),
            created: chrono::Utc::now().timestamp(),
        }
    }

    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<FinishReason>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            system_fingerprint: finish_reason.map(|_| SYSTEM_FINGERPRINT.to_string()),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                logprobs: None,
                finish_reason,
            }],
        }
    }

    pub fn role_chunk(&self) -> ChatCompletionChunk {
        self.chunk(
            ChunkDelta {
                role: Some("assistant".to_string()),
                content: Some(String::new()),
                tool_calls: None,
            },
            None,
        )
    }

    pub fn content_chunk(&self, text: impl Into<String>) -> ChatCompletionChunk {
        self.chunk(
            ChunkDelta {
                content: Some(text.into()),
                ..Default::default()
            },
            None,
        )
    }

    pub fn tool_call_chunk(&self, call: &ToolCall, index: u32) -> ChatCompletionChunk {
        self.chunk(
            ChunkDelta {
                tool_calls: Some(vec![to_stream_delta(call, index)]),
                ..Default::default()
            },
            None,
        )
    }

    pub fn finish_chunk(&self, reason: FinishReason) -> ChatCompletionChunk {
        self.chunk(ChunkDelta::default(), Some(reason))
    }
}

/// `data: <json>\n\n`.
pub fn sse_frame(event: &impl Serialize) -> String {
    // Chunk types serialize infallibly; an empty object keeps the stream well-formed regardless.
    let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    format!("data: {}\n\n", json)
}

pub(crate) fn sse_bytes(event: &impl Serialize) -> Bytes {
    Bytes::from(sse_frame(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_chunk_shape() {
        let meta = ChunkMeta::new("gpt-4o");
        let v = serde_json::to_value(meta.role_chunk()).unwrap();
        assert_eq!(v["object"], "chat.completion.chunk");
        assert_eq!(v["choices"][0]["delta"], json!({"role": "assistant", "content": ""}));
        assert!(v["choices"][0]["finish_reason"].is_null());
        assert!(v.get("system_fingerprint").is_none());
    }

    #[test]
    fn test_finish_chunk_has_empty_delta_and_fingerprint() {
        let meta = ChunkMeta::new("gpt-4o");
        let v = serde_json::to_value(meta.finish_chunk(FinishReason::ToolCalls)).unwrap();
        assert_eq!(v["choices"][0]["delta"], json!({}));
        assert_eq!(v["choices"][0]["finish_reason"], "tool_calls");
        assert_eq!(v["system_fingerprint"], SYSTEM_FINGERPRINT);
    }

    #[test]
    fn test_sse_framing() {
        let frame = sse_frame(&json!({"a": 1}));
        assert_eq!(frame, "data: {\"a\":1}\n\n");
    }
}
