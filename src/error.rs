//! Proxy error taxonomy: validation (400), upstream (propagated status),
//! unexpected (500). Rendered as `{ "error": true, "message": ..., "details"? }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::upstream::UpstreamError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: String,
        details: Option<Value>,
    },
    #[error("{0}")]
    Unexpected(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Validation(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UpstreamError> for ProxyError {
    fn from(e: UpstreamError) -> Self {
        match &e {
            // a non-JSON body is only in the message; details stays null
            UpstreamError::Status { status, .. } => ProxyError::Upstream {
                status: *status,
                message: e.to_string(),
                details: e.details(),
            },
            UpstreamError::Transport { .. } | UpstreamError::Decode { .. } => {
                ProxyError::Unexpected(e.to_string())
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ProxyError::Upstream {
                status, details, ..
            } => json!({
                "error": true,
                "message": self.to_string(),
                "status": status.as_u16(),
                "details": details,
            }),
            _ => json!({ "error": true, "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
