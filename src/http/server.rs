//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared pipeline state from configuration
//! - Create the Axum router with the ordered admission chain
//! - Serve with connect info and graceful shutdown
//! - Capture, forward and relay in the terminal handler

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderName,
    middleware::from_fn_with_state,
    response::Response,
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::schema::ProxyConfig;
use crate::config::size::{parse_human_size, SizeParseError};
use crate::error::ProxyError;
use crate::http::forward::ForwardingEngine;
use crate::http::middleware::{self, peer_label, reject};
use crate::http::request::{capture_body, ForwardRequest, ForwardTarget};
use crate::http::response::{relay, RelayLog};
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::metrics;
use crate::security::access_control::{AccessControlList, AclError};
use crate::security::admission::AdmissionController;
use crate::security::hosts::HostAllowList;

/// Configuration that cannot be turned into a running pipeline.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load allowed source ips: {0}")]
    Acl(#[from] AclError),

    #[error("failed to parse max body size: {0}")]
    BodySize(#[from] SizeParseError),

    #[error("invalid control header name: {0}")]
    ControlHeader(#[from] axum::http::header::InvalidHeaderName),

    #[error("failed to build upstream tls config: {0}")]
    Tls(#[from] rustls::Error),
}

/// Application state injected into middleware and handlers.
#[derive(Clone)]
pub struct AppState {
    pub admission: AdmissionController,
    pub clients: Arc<AccessControlList>,
    pub hosts: Arc<HostAllowList>,
    pub engine: Arc<ForwardingEngine>,
    pub control_header: HeaderName,
    pub max_body_size: u64,
}

impl AppState {
    /// Build every pipeline component. Any malformed rule aborts startup.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, StartupError> {
        let clients = AccessControlList::from_rules(&config.access.allowed_source_ips)?;
        if clients.is_empty() {
            tracing::warn!("allowed_source_ips is empty: every client may use this proxy");
        }

        let hosts = HostAllowList::new(&config.access.allowed_forwarded_hosts);
        if hosts.is_empty() {
            tracing::warn!("allowed_forwarded_hosts is empty: requests may target any host");
        }

        let control_header = HeaderName::try_from(config.proxy.control_header.trim())?;
        let max_body_size = parse_human_size(&config.proxy.max_body_size)?;
        let timeout = Duration::from_secs(config.proxy.upstream_timeout_secs);

        tracing::info!(
            client_rules = clients.len(),
            host_rules = hosts.len(),
            max_concurrency = config.proxy.max_concurrency,
            max_body_size,
            upstream_timeout = ?timeout,
            control_header = %control_header,
            "Pipeline configured"
        );

        Ok(Self {
            admission: AdmissionController::new(config.proxy.max_concurrency),
            clients: Arc::new(clients),
            hosts: Arc::new(hosts),
            engine: Arc::new(ForwardingEngine::new(&config.upstream, timeout)?),
            control_header,
            max_body_size,
        })
    }
}

/// HTTP server for the forward proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        let state = AppState::from_config(&config)?;
        let router = build_router(state);
        Ok(Self { router, config })
    }

    /// Run the server until Ctrl-C/SIGTERM or `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = shutdown.recv() => {
                        tracing::info!("Shutdown triggered");
                    }
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The bare router, for serving through another transport.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Build the router with the admission chain, outermost first.
pub fn build_router(state: AppState) -> Router {
    let chain = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                request_id = %Uuid::new_v4(),
                method = %req.method(),
                path = %req.uri().path(),
            )
        }))
        .layer(from_fn_with_state(state.clone(), middleware::admission))
        .layer(from_fn_with_state(state.clone(), middleware::client_access))
        .layer(from_fn_with_state(state.clone(), middleware::target_host));

    Router::new()
        .route("/", any(proxy_handler))
        .route("/{*path}", any(proxy_handler))
        .layer(chain)
        .with_state(state)
}

/// Capture the body, forward once, relay the answer.
async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let started = Instant::now();
    let client = peer_label(&request);
    let method = request.method().clone();

    let Some(target) = request.extensions().get::<ForwardTarget>().cloned() else {
        return reject(
            ProxyError::MissingTarget(state.control_header.to_string()),
            method.as_str(),
            &client,
            "",
        );
    };
    let target_str = target.url().to_string();

    let (parts, body) = request.into_parts();
    let deadline = state.engine.deadline();

    let captured = tokio::time::timeout_at(
        deadline.at(),
        capture_body(&parts.headers, body, state.max_body_size),
    )
    .await;
    let body = match captured {
        Ok(Ok(body)) => body,
        Ok(Err(error)) => return reject(error, method.as_str(), &client, &target_str),
        Err(_) => {
            let error = ProxyError::BodyRead("deadline exceeded".to_string());
            return reject(error, method.as_str(), &client, &target_str);
        }
    };

    tracing::debug!(method = %method, target = %target_str, bytes = body.len(), "Forwarding request");

    let outbound = ForwardRequest::new(
        method.clone(),
        target.url().clone(),
        parts.headers,
        &state.control_header,
        body,
    );

    match state.engine.forward(outbound, deadline).await {
        Ok(upstream) => {
            let status = upstream.status();
            metrics::record_request(method.as_str(), status.as_u16(), started);
            let log = RelayLog::new(method, client, target_str, status, started);
            relay(upstream, deadline, log)
        }
        Err(error) => reject(error.into(), method.as_str(), &client, &target_str),
    }
}
