//! HTTP mapping for [`Error`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::types::openai::ErrorEnvelope;
use crate::Error;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Error::Validation { message, context } => {
                let param = context
                    .field_path
                    .map(|p| p.trim_start_matches("request.").to_string());
                let body = ErrorEnvelope::new(message, "invalid_request_error").with_param(param);
                (status, Json(body)).into_response()
            }
            // Upstream JSON errors are relayed untouched.
            Error::Upstream {
                body: Some(body), ..
            } => (status, Json(body)).into_response(),
            Error::Upstream { status: code, body: None } => {
                let body = ErrorEnvelope::new(format!("Upstream error: HTTP {}", code), "upstream_error");
                (status, Json(body)).into_response()
            }
            Error::Transport(e) => {
                error!("Upstream unreachable: {}", e);
                let body = ErrorEnvelope::new(format!("Upstream unreachable: {}", e), "upstream_error");
                (status, Json(body)).into_response()
            }
            other => {
                error!("Request failed: {}", other);
                let body = ErrorEnvelope::new(other.to_string(), "internal_error");
                (status, Json(body)).into_response()
            }
        }
    }
}
