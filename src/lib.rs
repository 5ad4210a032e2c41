//! # gateway-bridge
//!
//! 面向上游推理网关的 OpenAI 兼容桥接服务，统一 OpenAI、Anthropic 与 Google 三种工具调用格式。
//!
//! OpenAI-compatible bridge in front of an internal inference gateway. Clients
//! speak the OpenAI chat-completions API; upstream models answer in whatever
//! schema their vendor family uses. The bridge normalizes tool calling in both
//! directions.
//!
//! ## Data flow
//!
//! 1. [`registry::resolve`] maps the requested model to a [`ModelFamily`].
//! 2. [`tools::ToolInjector`] attaches tools natively or as a `<tool_call>` prompt.
//! 3. [`transport::UpstreamGateway`] performs the upstream call.
//! 4. [`tools::ToolInterceptor`] recovers universal [`ToolCall`]s and clean text.
//! 5. [`tools::adapters`] or [`stream::ChunkAssembler`] render the OpenAI result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gateway_bridge::{config::BridgeConfig, server, transport::HttpUpstream};
//!
//! #[tokio::main]
//! async fn main() -> gateway_bridge::Result<()> {
//!     let config = BridgeConfig::load(None)?;
//!     let upstream = Arc::new(HttpUpstream::new(config.upstream.clone())?);
//!     server::serve(server::AppState::new(config, upstream)).await
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`registry`] | Model aliases, environments and family resolution |
//! | [`types`] | Universal tool types and OpenAI/upstream wire shapes |
//! | [`drivers`] | Per-family native tool blocks and response decoding |
//! | [`tools`] | Injector, Interceptor, prompt protocol, output adapters |
//! | [`stream`] | Emulated and relayed SSE streaming |
//! | [`transport`] | Upstream gateway client |
//! | [`server`] | axum routes |
//! | [`config`] | Layered configuration |
//! | [`logging`] | Subscriber setup and log helpers |

pub mod config;
pub mod drivers;
pub mod logging;
pub mod registry;
pub mod server;
pub mod stream;
pub mod tools;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use registry::ModelFamily;
pub use tools::{Diagnostic, Interception, OutboundAugmentation, ToolInjector, ToolInterceptor};
pub use types::{
    message::{Message, MessageRole},
    tool::{Tool, ToolCall, ToolChoice},
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
