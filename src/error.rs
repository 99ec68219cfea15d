//! Error types for the forward proxy.
//!
//! Per-request failures map to a status code and a short message.
//! Upstream causes are logged by the pipeline, never rendered to clients.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure of the single outbound attempt.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("target is not a valid request uri: {0}")]
    InvalidUri(#[from] axum::http::uri::InvalidUri),

    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("upstream deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error("no response headers within {0:?}")]
    ResponseHeaderTimeout(Duration),
}

impl ForwardError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ResponseHeaderTimeout(_))
    }
}

/// Failure while streaming an upstream body back to the caller.
///
/// The status line is already committed, so these are only logged.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream body failed: {0}")]
    Body(#[from] hyper::Error),

    #[error("deadline exceeded while relaying body")]
    Deadline,
}

/// Per-request pipeline failure.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("too many requests")]
    Saturated,

    #[error("invalid client ip")]
    InvalidClientAddress,

    #[error("client not allowed")]
    ClientDenied,

    #[error("{0} is required")]
    MissingTarget(String),

    #[error("invalid {header}: {reason}")]
    InvalidTarget { header: String, reason: String },

    #[error("host not allowed")]
    HostDenied,

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: u64 },

    #[error("read body failed: {0}")]
    BodyRead(String),

    #[error(transparent)]
    Upstream(#[from] ForwardError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Saturated => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidClientAddress | Self::MissingTarget(_) | Self::InvalidTarget { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::ClientDenied | Self::HostDenied => StatusCode::FORBIDDEN,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyRead(_) | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Saturated => "saturated",
            Self::InvalidClientAddress => "invalid-client-address",
            Self::ClientDenied => "client-denied",
            Self::MissingTarget(_) => "missing-target",
            Self::InvalidTarget { .. } => "invalid-target",
            Self::HostDenied => "host-denied",
            Self::BodyTooLarge { .. } => "body-too-large",
            Self::BodyRead(_) => "read-body-failed",
            Self::Upstream(e) if e.is_timeout() => "upstream-timeout",
            Self::Upstream(_) => "upstream-failed",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::ClientDenied => "forbidden".to_string(),
            Self::BodyTooLarge { .. } => "request body too large".to_string(),
            Self::BodyRead(_) => "read body failed".to_string(),
            Self::Upstream(_) => "upstream request failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.client_message()).into_response()
    }
}
