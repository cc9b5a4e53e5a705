use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Boxed error type carried through the trace hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Transport-layer failure reported to the tracer by the HTTP client.
///
/// These are collected, never thrown: a request that produced them still
/// yields a `Trail`.
#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("dial {network} {addr}: {source}")]
    Connect {
        network: String,
        addr: String,
        #[source]
        source: BoxError,
    },

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(#[source] BoxError),

    #[error("writing request failed: {0}")]
    WriteRequest(#[source] BoxError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] hyper::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    #[error("DNS lookup failed: {0}")]
    Dns(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::RequestFailed(e) => {
                if e.is_timeout() {
                    "TIMEOUT"
                } else if e.is_incomplete_message() || e.is_body_write_aborted() {
                    "REQUEST_ERROR"
                } else {
                    "REQUEST_FAILED"
                }
            }
            AppError::InvalidUrl(_) => "INVALID_URL",
            AppError::InvalidMethod(_) => "INVALID_METHOD",
            AppError::Dns(_) => "DNS_ERROR",
            AppError::ConnectionFailed(_) => "CONNECTION_FAILED",
            AppError::Tls(_) => "TLS_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidUrl(_) | AppError::InvalidMethod(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": {
                "message": self.to_string(),
                "code": self.code(),
            }
        }));

        (self.status(), body).into_response()
    }
}
