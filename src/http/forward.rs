//! Upstream dispatch.
//!
//! # Responsibilities
//! - Own the process-wide outbound client and its connection pool
//! - Send exactly one attempt per request, never retried
//! - Bound the attempt by the request's own deadline
//!
//! # Design Decisions
//! - No client-wide timeout: each call carries its deadline, so one slow
//!   target cannot stretch another request's budget
//! - The pool is keyed by scheme and authority inside hyper-util
//! - Dial and TLS handshake are bounded by the connector
//! - The TLS provider is pinned to ring rather than the process default,
//!   which is ambiguous when more than one provider is linked in

use std::time::Duration;

use axum::http::{Request, Response, Uri};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::time::Instant;

use crate::config::schema::UpstreamConfig;
use crate::error::ForwardError;
use crate::http::connector::HandshakeTimeout;
use crate::http::request::ForwardRequest;

// Roughly thirty years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

type UpstreamConnector = HandshakeTimeout<HttpsConnector<HttpConnector>>;

/// The time budget of one forwarding attempt.
///
/// Covers body capture, dispatch and the relay of the response body.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Budgets past what `Instant` can represent saturate to a far-off
    /// instant instead of overflowing.
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        Self {
            at: now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE),
            budget,
        }
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

/// Builds and dispatches outbound requests over a shared pool.
///
/// Constructed once at startup and shared by reference.
pub struct ForwardingEngine {
    client: Client<UpstreamConnector, Full<Bytes>>,
    timeout: Duration,
    response_header_timeout: Option<Duration>,
}

impl ForwardingEngine {
    pub fn new(config: &UpstreamConfig, timeout: Duration) -> Result<Self, rustls::Error> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(secs(config.connect_timeout_secs));
        http.set_keepalive(secs(config.tcp_keepalive_secs));

        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http);

        let handshake = match (secs(config.connect_timeout_secs), secs(config.tls_handshake_timeout_secs)) {
            (Some(dial), Some(tls)) => Some(dial + tls),
            (dial, tls) => dial.or(tls),
        };

        // hyper-util only caps idle connections per host; the total cap
        // bounds that instead. Zero total means no extra cap.
        let per_host = match config.max_idle_conns {
            0 => config.max_idle_conns_per_host,
            total => config.max_idle_conns_per_host.min(total),
        };

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .timer(TokioTimer::new())
            .pool_max_idle_per_host(per_host)
            .pool_idle_timeout(secs(config.idle_conn_timeout_secs))
            .build(HandshakeTimeout::new(https, handshake));

        tracing::debug!(
            max_idle_per_host = per_host,
            idle_timeout_secs = config.idle_conn_timeout_secs,
            handshake_timeout = ?handshake,
            response_header_timeout_secs = config.response_header_timeout_secs,
            "Upstream client ready"
        );

        Ok(Self {
            client,
            timeout,
            response_header_timeout: secs(config.response_header_timeout_secs),
        })
    }

    /// Start the clock for a new attempt.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.timeout)
    }

    /// Send the request and wait for the response head.
    ///
    /// The response body is left streaming; the relay keeps honoring the
    /// same deadline.
    pub async fn forward(&self, request: ForwardRequest, deadline: Deadline) -> Result<Response<Incoming>, ForwardError> {
        let uri: Uri = request.target.as_str().parse()?;

        let mut outbound = Request::new(Full::new(request.body));
        *outbound.method_mut() = request.method;
        *outbound.uri_mut() = uri;
        *outbound.headers_mut() = request.headers;

        let sent = self.client.request(outbound);
        let response_head = async {
            match self.response_header_timeout {
                Some(limit) => match tokio::time::timeout(limit, sent).await {
                    Ok(result) => result.map_err(ForwardError::from),
                    Err(_) => Err(ForwardError::ResponseHeaderTimeout(limit)),
                },
                None => sent.await.map_err(ForwardError::from),
            }
        };

        match tokio::time::timeout_at(deadline.at(), response_head).await {
            Ok(result) => result,
            Err(_) => Err(ForwardError::Timeout(deadline.budget())),
        }
    }
}
