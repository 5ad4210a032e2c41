//! 类型系统模块：通用工具调用类型与 OpenAI 兼容的线上格式。
//!
//! # Types Module
//!
//! Vendor-neutral tool-calling types plus the OpenAI-compatible and upstream
//! wire shapes the bridge reads and writes.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`tool`] | [`Tool`], [`ToolChoice`], [`ToolCall`] |
//! | [`message`] | Chat messages accepted from clients |
//! | [`openai`] | OpenAI-compatible requests, responses and stream chunks |
//! | [`upstream`] | Bodies sent to the upstream gateway |

pub mod message;
pub mod openai;
pub mod tool;
pub mod upstream;

pub use message::{ContentPart, Message, MessageContent, MessageRole};
pub use openai::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionMessageToolCall, ChatCompletionRequest,
    ChoiceDeltaToolCall, FinishReason, ResponseFunctionToolCall,
};
pub use tool::{Tool, ToolCall, ToolChoice, ToolDefinition};
pub use upstream::{UpstreamChatRequest, UpstreamEmbedRequest};
