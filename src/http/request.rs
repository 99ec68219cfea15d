//! Inbound request handling.
//!
//! # Responsibilities
//! - Parse and validate the control header naming the target
//! - Capture the body under the configured cap
//! - Prepare the header set that is forwarded upstream
//!
//! # Design Decisions
//! - A declared `Content-Length` over the cap is rejected before reading
//! - Oversize is reported distinctly from other read failures
//! - Framing headers are recomputed by the outbound client

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName, Method};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use url::{Host, Url};

use crate::error::ProxyError;

/// Validated upstream target, attached to the request once the control
/// header has been parsed.
#[derive(Debug, Clone)]
pub struct ForwardTarget {
    url: Url,
    host: String,
}

impl ForwardTarget {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Hostname without port or IPv6 brackets.
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Read the target URL from the control header.
///
/// The URL must be absolute with an `http` or `https` scheme and a host.
pub fn parse_target(headers: &HeaderMap, control: &HeaderName) -> Result<ForwardTarget, ProxyError> {
    let invalid = |reason: &str| ProxyError::InvalidTarget {
        header: control.to_string(),
        reason: reason.to_string(),
    };

    let raw = match headers.get(control) {
        Some(value) => value.to_str().map_err(|_| invalid("not valid text"))?.trim(),
        None => "",
    };
    if raw.is_empty() {
        return Err(ProxyError::MissingTarget(control.to_string()));
    }

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }

    let host = match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_ascii_lowercase(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        _ => return Err(invalid("missing host")),
    };

    Ok(ForwardTarget { url, host })
}

/// Read the whole body, failing with `BodyTooLarge` past `limit` bytes.
pub async fn capture_body(headers: &HeaderMap, body: Body, limit: u64) -> Result<Bytes, ProxyError> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ProxyError::BodyTooLarge { limit });
    }

    let cap = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(body, cap).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(ProxyError::BodyTooLarge { limit }),
        Err(e) => Err(ProxyError::BodyRead(e.to_string())),
    }
}

/// One outbound attempt, owned by the handling task.
#[derive(Debug)]
pub struct ForwardRequest {
    pub method: Method,
    pub target: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ForwardRequest {
    /// Take the inbound header set minus the control header and framing
    /// headers. Multi-valued headers keep every value in order.
    pub fn new(method: Method, target: Url, mut headers: HeaderMap, control: &HeaderName, body: Bytes) -> Self {
        headers.remove(control);
        headers.remove(HOST);
        headers.remove(CONTENT_LENGTH);
        headers.remove(TRANSFER_ENCODING);

        Self {
            method,
            target,
            headers,
            body,
        }
    }
}
