use crate::config::UpstreamConfig;
use crate::registry;
use crate::transport::{TransportError, UpstreamGateway};
use crate::types::upstream::{UpstreamChatRequest, UpstreamEmbedRequest};
use crate::{BoxStream, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::Proxy;
use serde_json::Value;
use std::env;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct HttpUpstream {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl HttpUpstream {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(
                env::var("BRIDGE_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("BRIDGE_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )));

        if let Ok(proxy_url) = env::var("BRIDGE_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client, config })
    }

    async fn post_json(&self, url: &str, body: &impl serde::Serialize) -> Result<Value> {
        debug!(url, "POST upstream");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(TransportError::Http)?;
        let response = check_status(response).await?;
        let json = response.json().await.map_err(TransportError::Http)?;
        Ok(json)
    }
}

/// Map a non-2xx response to [`Error::Upstream`], keeping a JSON body when present.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "Upstream returned an error");
    Err(Error::Upstream {
        status: status.as_u16(),
        body: serde_json::from_str(&text).ok(),
    })
}

#[async_trait]
impl UpstreamGateway for HttpUpstream {
    async fn chat(&self, request: &UpstreamChatRequest) -> Result<Value> {
        let url = registry::chat_url(&self.config, &request.model);
        self.post_json(url, request).await
    }

    async fn chat_stream(&self, request: &UpstreamChatRequest) -> Result<BoxStream<'static, Bytes>> {
        let response = self
            .client
            .post(&self.config.stream_url)
            .json(request)
            .send()
            .await
            .map_err(TransportError::Http)?;
        let response = check_status(response).await?;

        let byte_stream = response
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));
        Ok(Box::pin(byte_stream))
    }

    async fn embed(&self, request: &UpstreamEmbedRequest) -> Result<Value> {
        let url = registry::embed_url(&self.config);
        self.post_json(url, request).await
    }
}

/// Probe every configured endpoint with a HEAD request.
///
/// Failures are logged, never fatal: the gateway may reject HEAD yet serve POST.
/// Returns the number of reachable endpoints.
pub async fn check_connections(config: &UpstreamConfig) -> usize {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            warn!("Connection check skipped: {}", e);
            return 0;
        }
    };

    let mut reachable = 0;
    for (label, url) in config.endpoints() {
        match client.head(url).send().await {
            Ok(resp) => {
                reachable += 1;
                info!(endpoint = label, status = resp.status().as_u16(), "Upstream reachable");
            }
            Err(e) => warn!(endpoint = label, url, "Upstream unreachable: {}", e),
        }
    }
    reachable
}
