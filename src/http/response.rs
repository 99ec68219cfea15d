//! Response relay.
//!
//! # Responsibilities
//! - Copy upstream status and headers to the client response
//! - Stream the upstream body without buffering it
//! - Keep honoring the request deadline while streaming
//!
//! # Design Decisions
//! - Status and headers are committed before the body is copied, so a
//!   mid-body failure cannot become an error response. The failure is
//!   logged and the stream errors, which makes the server drop the
//!   connection.
//! - `transfer-encoding` is not copied; the inbound server frames the body.

use std::time::Instant as StdInstant;

use axum::body::Body;
use axum::http::header::TRANSFER_ENCODING;
use axum::http::{Method, Response, StatusCode};
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use http_body_util::BodyExt;
use hyper::body::Incoming;

use crate::error::RelayError;
use crate::http::forward::Deadline;

/// Request facts carried along for the final log line.
#[derive(Debug)]
pub struct RelayLog {
    pub method: Method,
    pub client: String,
    pub target: String,
    pub status: StatusCode,
    pub started: StdInstant,
    finished: bool,
    bytes: u64,
}

impl RelayLog {
    pub fn new(method: Method, client: String, target: String, status: StatusCode, started: StdInstant) -> Self {
        Self {
            method,
            client,
            target,
            status,
            started,
            finished: false,
            bytes: 0,
        }
    }

    fn completed(&mut self) {
        self.finished = true;
        tracing::info!(
            status = self.status.as_u16(),
            method = %self.method,
            client = %self.client,
            target = %self.target,
            bytes = self.bytes,
            duration = ?self.started.elapsed(),
            "Relayed upstream response"
        );
    }

    fn failed(&mut self, error: &RelayError) {
        self.finished = true;
        tracing::warn!(
            error = %error,
            status = self.status.as_u16(),
            method = %self.method,
            client = %self.client,
            target = %self.target,
            bytes = self.bytes,
            duration = ?self.started.elapsed(),
            "Copy of upstream response failed, abandoning connection"
        );
    }
}

impl Drop for RelayLog {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                method = %self.method,
                target = %self.target,
                bytes = self.bytes,
                "Client went away before the relay finished"
            );
        }
    }
}

/// Turn the upstream response into the client response.
pub fn relay(upstream: Response<Incoming>, deadline: Deadline, log: RelayLog) -> Response<Body> {
    let (parts, body) = upstream.into_parts();

    let mut response = Response::new(Body::from_stream(relay_stream(body, deadline, log)));
    *response.status_mut() = parts.status;

    let headers = response.headers_mut();
    for (name, value) in parts.headers.iter() {
        if name == TRANSFER_ENCODING {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    response
}

struct RelayState<S> {
    frames: S,
    deadline: Deadline,
    log: RelayLog,
    done: bool,
}

fn relay_stream(body: Incoming, deadline: Deadline, log: RelayLog) -> impl Stream<Item = Result<Bytes, RelayError>> + Send {
    let state = RelayState {
        frames: body.into_data_stream(),
        deadline,
        log,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        let next = tokio::time::timeout_at(state.deadline.at(), state.frames.next()).await;
        let error = match next {
            Ok(Some(Ok(chunk))) => {
                state.log.bytes += chunk.len() as u64;
                return Some((Ok(chunk), state));
            }
            Ok(None) => {
                state.log.completed();
                return None;
            }
            Ok(Some(Err(e))) => RelayError::Body(e),
            Err(_) => RelayError::Deadline,
        };

        state.log.failed(&error);
        state.done = true;
        Some((Err(error), state))
    })
}
