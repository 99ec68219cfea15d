//! Configuration validation.
//!
//! Returns every problem found, not just the first. Runs before any
//! pipeline component is built.

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::schema::ProxyConfig;
use crate::config::size::parse_human_size;
use crate::security::access_control::AccessControlList;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Upper bound on the per-request budget: one day.
pub const MAX_UPSTREAM_TIMEOUT_SECS: u64 = 24 * 60 * 60;

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address", config.listener.bind_address),
        ));
    }

    if HeaderName::try_from(config.proxy.control_header.trim()).is_err() {
        errors.push(ValidationError::new(
            "proxy.control_header",
            format!("{:?} is not a valid header name", config.proxy.control_header),
        ));
    }

    if config.proxy.max_concurrency == 0 {
        errors.push(ValidationError::new("proxy.max_concurrency", "must be greater than 0"));
    } else if config.proxy.max_concurrency > Semaphore::MAX_PERMITS {
        errors.push(ValidationError::new(
            "proxy.max_concurrency",
            format!("must be at most {}", Semaphore::MAX_PERMITS),
        ));
    }

    match parse_human_size(&config.proxy.max_body_size) {
        Ok(0) => errors.push(ValidationError::new("proxy.max_body_size", "must be greater than 0")),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new("proxy.max_body_size", e.to_string())),
    }

    if config.proxy.upstream_timeout_secs == 0 {
        errors.push(ValidationError::new("proxy.upstream_timeout_secs", "must be greater than 0"));
    } else if config.proxy.upstream_timeout_secs > MAX_UPSTREAM_TIMEOUT_SECS {
        errors.push(ValidationError::new(
            "proxy.upstream_timeout_secs",
            format!("must be at most {MAX_UPSTREAM_TIMEOUT_SECS}"),
        ));
    }

    if let Err(e) = AccessControlList::from_rules(&config.access.allowed_source_ips) {
        errors.push(ValidationError::new("access.allowed_source_ips", e.to_string()));
    }

    if config.observability.metrics_enabled && config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.proxy.control_header = "bad header".into();
        config.proxy.max_concurrency = 0;
        config.proxy.max_body_size = "lots".into();
        config.proxy.upstream_timeout_secs = 0;
        config.access.allowed_source_ips = vec!["300.1.1.1".into()];
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nope".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "proxy.control_header",
                "proxy.max_concurrency",
                "proxy.max_body_size",
                "proxy.upstream_timeout_secs",
                "access.allowed_source_ips",
                "observability.metrics_address",
            ]
        );
    }

    #[test]
    fn zero_body_size_is_rejected() {
        let mut config = ProxyConfig::default();
        config.proxy.max_body_size = "0".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "proxy.max_body_size");
    }

    #[test]
    fn oversized_limits_are_rejected() {
        let mut config = ProxyConfig::default();
        config.proxy.max_concurrency = Semaphore::MAX_PERMITS + 1;
        config.proxy.upstream_timeout_secs = i64::MAX as u64;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["proxy.max_concurrency", "proxy.upstream_timeout_secs"]);

        config.proxy.max_concurrency = Semaphore::MAX_PERMITS;
        config.proxy.upstream_timeout_secs = MAX_UPSTREAM_TIMEOUT_SECS;
        assert!(validate_config(&config).is_ok());
    }
}
