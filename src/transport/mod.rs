//! 上游传输层：与推理网关通信的抽象与 HTTP 实现
//!
//! Upstream transport. [`UpstreamGateway`] is the seam between request
//! handling and the network; [`http::HttpUpstream`] is the reqwest-backed
//! implementation. No retries happen at this layer.

pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::types::upstream::{UpstreamChatRequest, UpstreamEmbedRequest};
use crate::{BoxStream, Result};

pub use http::{check_connections, HttpUpstream};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

/// Calls made against the upstream inference gateway.
#[async_trait]
pub trait UpstreamGateway: Send + Sync {
    /// Complete a chat or prompt request; returns the raw JSON body.
    async fn chat(&self, request: &UpstreamChatRequest) -> Result<Value>;

    /// Start an incremental text stream.
    async fn chat_stream(&self, request: &UpstreamChatRequest) -> Result<BoxStream<'static, Bytes>>;

    /// Embed one batch; returns the raw JSON body.
    async fn embed(&self, request: &UpstreamEmbedRequest) -> Result<Value>;
}
