//! Mock upstream gateway for integration tests

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use gateway_bridge::config::{BridgeConfig, ToolMode, UpstreamConfig};
use gateway_bridge::server::{create_router, AppState};
use gateway_bridge::transport::HttpUpstream;
use http_body_util::BodyExt;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::Value;
use tokio::sync::Mutex;
use tower::ServiceExt;

pub const PROD_CHAT: &str = "/prod/chat/";
pub const DEV_CHAT: &str = "/dev/chat/";
pub const PROD_EMBED: &str = "/prod/embed/";
pub const STREAM: &str = "/stream/";

/// Test fixture that manages a mock upstream gateway
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    /// Upstream endpoints all pointing at the mock server
    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            prod_chat_url: format!("{}{}", self.base_url, PROD_CHAT),
            prod_embed_url: format!("{}{}", self.base_url, PROD_EMBED),
            dev_chat_url: format!("{}{}", self.base_url, DEV_CHAT),
            dev_embed_url: format!("{}/dev/embed/", self.base_url),
            stream_url: format!("{}{}", self.base_url, STREAM),
            timeout_secs: 5,
            embed_batch_size: 2,
        }
    }

    /// Bridge router wired to the mock upstream
    pub fn router(&self, tool_mode: ToolMode) -> Router {
        let config = BridgeConfig {
            tool_mode,
            check_connection: false,
            upstream: self.upstream_config(),
            ..BridgeConfig::default()
        };
        let upstream = HttpUpstream::new(config.upstream.clone()).expect("http client");
        create_router(AppState::new(config, Arc::new(upstream)))
    }

    /// Mock a JSON reply on `path`
    pub async fn mock_json_response(&self, path: &str, status: usize, body: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Mock a JSON reply on `path` only for request bodies matching `matcher`
    pub async fn mock_json_matching(&self, path: &str, matcher: Matcher, body: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", path)
            .match_body(matcher)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Mock a raw text stream on the streaming endpoint
    pub async fn mock_text_stream(&self, body: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", STREAM)
            .with_status(200)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body(body)
            .create_async()
            .await
    }
}

/// POST a JSON body through the router
pub async fn post_json(app: Router, uri: &str, body: &Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Decode an SSE body into its JSON frames; the `[DONE]` sentinel is returned
/// as `Value::Null`.
pub fn sse_frames(body: &str) -> Vec<Value> {
    body.split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            let data = frame.strip_prefix("data: ").expect("SSE data frame");
            if data == "[DONE]" {
                Value::Null
            } else {
                serde_json::from_str(data).unwrap()
            }
        })
        .collect()
}
