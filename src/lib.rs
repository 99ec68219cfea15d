//! Forward proxy front door.
//!
//! Accepts requests naming their target in a control header, checks the
//! caller and the target against allow-lists, forwards exactly once and
//! streams the answer back untouched.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::{ForwardError, ProxyError, RelayError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
