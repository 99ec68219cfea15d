//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Admission, body and deadline settings for forwarded requests.
    pub proxy: ForwardConfig,

    /// Outbound transport and connection pool settings.
    pub upstream: UpstreamConfig,

    /// Client and target allow-lists.
    pub access: AccessConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Per-request forwarding settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Header carrying the absolute target URL.
    pub control_header: String,

    /// Maximum number of requests processed at once. Excess requests get 429.
    pub max_concurrency: usize,

    /// Request body cap as a human size ("10MB", "512kb", "1024").
    pub max_body_size: String,

    /// Deadline for one forwarding attempt in seconds.
    pub upstream_timeout_secs: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            control_header: "forward-url".to_string(),
            max_concurrency: 1024,
            max_body_size: "10MB".to_string(),
            upstream_timeout_secs: 30,
        }
    }
}

/// Outbound transport configuration.
///
/// Zero disables a timeout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Idle connections kept across all hosts.
    ///
    /// The pool only caps idle connections per host, so this is applied
    /// by clamping `max_idle_conns_per_host` to it. With many hosts the
    /// process-wide idle count can exceed it. Zero means no clamp.
    pub max_idle_conns: usize,

    /// Idle connections kept per upstream host.
    pub max_idle_conns_per_host: usize,

    /// How long an idle pooled connection is kept.
    pub idle_conn_timeout_secs: u64,

    /// TCP dial timeout.
    pub connect_timeout_secs: u64,

    /// TLS handshake timeout, on top of the dial.
    pub tls_handshake_timeout_secs: u64,

    /// Wait for `100 Continue` before sending the body.
    ///
    /// Accepted for compatibility but ignored: the outbound client has no
    /// expect-continue support and always sends the body with the head.
    pub expect_continue_timeout_secs: u64,

    /// Wait for the response head once the request is written.
    pub response_header_timeout_secs: u64,

    /// TCP keepalive interval for outbound sockets.
    pub tcp_keepalive_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            max_idle_conns: 100,
            max_idle_conns_per_host: 10,
            idle_conn_timeout_secs: 90,
            connect_timeout_secs: 10,
            tls_handshake_timeout_secs: 10,
            expect_continue_timeout_secs: 1,
            response_header_timeout_secs: 0,
            tcp_keepalive_secs: 30,
        }
    }
}

/// Allow-lists.
///
/// An empty list allows everything. Leaving both empty runs an open proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AccessConfig {
    /// Client addresses ("10.0.0.7") and ranges ("10.0.0.0/8").
    pub allowed_source_ips: Vec<String>,

    /// Target hostnames, matched case-insensitively.
    pub allowed_forwarded_hosts: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Full,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}
