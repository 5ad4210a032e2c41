//! OpenAI 兼容 HTTP 服务：路由、共享状态与启动
//!
//! OpenAI-compatible HTTP surface on axum.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /v1/chat/completions`, `/chat/completions`, `/api/chat/completions` | chat |
//! | `POST /v1/completions`, `/completions` | legacy completions |
//! | `POST /v1/embeddings`, `/embeddings` | embeddings |
//! | `GET /v1/models`, `/models` | model listing |
//! | `GET /health` | liveness |

mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::BridgeConfig;
use crate::transport::UpstreamGateway;
use crate::{Error, ErrorContext, Result};

/// Shared, read-only per-process state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub upstream: Arc<dyn UpstreamGateway>,
}

impl AppState {
    pub fn new(config: BridgeConfig, upstream: Arc<dyn UpstreamGateway>) -> Self {
        Self {
            config: Arc::new(config),
            upstream,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/models", get(handlers::list_models))
        .route("/models", get(handlers::list_models))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/chat/completions", post(handlers::chat_completions))
        .route("/api/chat/completions", post(handlers::chat_completions))
        .route("/v1/completions", post(handlers::completions))
        .route("/completions", post(handlers::completions))
        .route("/v1/embeddings", post(handlers::embeddings))
        .route("/embeddings", post(handlers::embeddings))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `host:port` from the config and serve until Ctrl-C.
pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port)
        .parse()
        .map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid listen address: {}", e),
                ErrorContext::new().with_field_path("host").with_source("server"),
            )
        })?;
    let listener = TcpListener::bind(addr).await?;
    info!("Gateway bridge listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway bridge shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
