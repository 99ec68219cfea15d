//! The admission chain in front of the forwarding handler.
//!
//! # Data Flow
//! ```text
//! admission     → 429 when every permit is held
//!   client_access → 400 unparseable address, 403 denied
//!     target_host   → 400 missing/invalid control header, 403 denied host
//!       proxy_handler (body capture, forward, relay)
//! ```
//!
//! Each stage short-circuits. The permit taken by `admission` lives until
//! the response body has been streamed or dropped.

use std::net::SocketAddr;

use axum::body::{Body, HttpBody};
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;

use crate::error::ProxyError;
use crate::http::request::parse_target;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::admission::AdmissionPermit;
use crate::security::client_ip::client_ip;

/// Transport peer as a log field.
pub(crate) fn peer_label(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Log and count a request the gate answers itself.
pub(crate) fn reject(error: ProxyError, method: &str, client: &str, target: &str) -> Response {
    metrics::record_rejection(error.kind());
    if matches!(error, ProxyError::Upstream(_) | ProxyError::BodyRead(_)) {
        tracing::error!(
            error = error.kind(),
            detail = %error,
            method,
            client,
            target,
            "Request failed"
        );
    } else {
        tracing::warn!(error = error.kind(), method, client, target, "Request rejected");
    }
    error.into_response()
}

fn target_label(req: &Request, state: &AppState) -> String {
    req.headers()
        .get(&state.control_header)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_string()
}

pub async fn admission(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(permit) = state.admission.try_acquire() else {
        return reject(
            ProxyError::Saturated,
            req.method().as_str(),
            &peer_label(&req),
            &target_label(&req, &state),
        );
    };

    let response = next.run(req).await;
    hold_until_streamed(response, permit)
}

/// Keep the permit alive for as long as the body is being sent.
fn hold_until_streamed(response: Response, permit: AdmissionPermit) -> Response {
    if response.body().size_hint().exact().is_some() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let frames = body.into_data_stream().map(move |frame| {
        let _held = &permit;
        frame
    });
    Response::from_parts(parts, Body::from_stream(frames))
}

pub async fn client_access(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.clients.is_empty() {
        return next.run(req).await;
    }

    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| *addr);
    let denied = match client_ip(req.headers(), peer) {
        None => Some(ProxyError::InvalidClientAddress),
        Some(ip) if !state.clients.allow(ip) => Some(ProxyError::ClientDenied),
        Some(_) => None,
    };

    match denied {
        Some(error) => reject(error, req.method().as_str(), &peer_label(&req), &target_label(&req, &state)),
        None => next.run(req).await,
    }
}

pub async fn target_host(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let target = match parse_target(req.headers(), &state.control_header) {
        Ok(target) => target,
        Err(error) => {
            return reject(error, req.method().as_str(), &peer_label(&req), &target_label(&req, &state));
        }
    };

    if !state.hosts.allow(target.host()) {
        return reject(
            ProxyError::HostDenied,
            req.method().as_str(),
            &peer_label(&req),
            target.url().as_str(),
        );
    }

    req.extensions_mut().insert(target);
    next.run(req).await
}
