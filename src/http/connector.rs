//! Outbound connector with a bounded handshake.
//!
//! `HttpConnector` bounds the TCP dial on its own but nothing bounds the
//! TLS handshake that follows. This wrapper puts one deadline over the
//! whole connect future.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::Uri;
use thiserror::Error;
use tower::Service;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
#[error("connect and handshake did not finish within {0:?}")]
pub struct HandshakeTimedOut(pub Duration);

/// Wraps a connector so establishing a connection cannot exceed `timeout`.
#[derive(Debug, Clone)]
pub struct HandshakeTimeout<C> {
    inner: C,
    timeout: Option<Duration>,
}

impl<C> HandshakeTimeout<C> {
    pub fn new(inner: C, timeout: Option<Duration>) -> Self {
        Self { inner, timeout }
    }
}

impl<C> Service<Uri> for HandshakeTimeout<C>
where
    C: Service<Uri>,
    C::Error: Into<BoxError>,
    C::Future: Send + 'static,
    C::Response: Send + 'static,
{
    type Response = C::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let connecting = self.inner.call(dst);
        let timeout = self.timeout;

        Box::pin(async move {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, connecting).await {
                    Ok(result) => result.map_err(Into::into),
                    Err(_) => Err(HandshakeTimedOut(limit).into()),
                },
                None => connecting.await.map_err(Into::into),
            }
        })
    }
}
